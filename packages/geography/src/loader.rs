//! Reads neighborhood boundaries from a `GeoJSON` `FeatureCollection`.
//!
//! Each feature contributes one [`NeighborhoodGeometry`]: its name comes
//! from a configurable property, its outline from the feature geometry.
//! Features with a missing name or a non-polygonal geometry are skipped.

use std::path::Path;

use geojson::{Feature, GeoJson};
use survey_map_geography_models::{Boundary, NeighborhoodGeometry};

use crate::GeometryError;

/// Property holding the neighborhood name when none is configured.
pub const DEFAULT_NAME_PROPERTY: &str = "barrio";

/// Parses boundaries from `GeoJSON` text.
///
/// Accepts a `FeatureCollection` or a single `Feature`.
///
/// # Errors
///
/// Returns [`GeometryError`] if the text is not valid `GeoJSON` or is a
/// bare geometry without properties.
pub fn parse_boundaries(
    geojson_str: &str,
    name_property: &str,
) -> Result<Vec<NeighborhoodGeometry>, GeometryError> {
    let features = match geojson_str.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(GeometryError::Conversion {
                message: "expected a FeatureCollection, found a bare geometry".to_string(),
            });
        }
    };

    let total = features.len();
    let boundaries: Vec<NeighborhoodGeometry> = features
        .into_iter()
        .filter_map(|feature| feature_boundary(feature, name_property))
        .collect();

    if boundaries.len() < total {
        log::warn!(
            "Skipped {} of {total} features without a '{name_property}' name or polygon geometry",
            total - boundaries.len()
        );
    }

    Ok(boundaries)
}

/// Reads and parses a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`GeometryError`] if the file cannot be read or parsed.
pub fn load_boundaries(
    path: &Path,
    name_property: &str,
) -> Result<Vec<NeighborhoodGeometry>, GeometryError> {
    let boundaries = parse_boundaries(&std::fs::read_to_string(path)?, name_property)?;
    log::info!(
        "Loaded {} neighborhood boundaries from {}",
        boundaries.len(),
        path.display()
    );
    Ok(boundaries)
}

fn feature_boundary(feature: Feature, name_property: &str) -> Option<NeighborhoodGeometry> {
    let barrio = match feature.property(name_property)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if barrio.is_empty() {
        return None;
    }

    let geometry = feature.geometry?;
    let boundary = match geo::Geometry::<f64>::try_from(geometry).ok()? {
        geo::Geometry::Polygon(p) => Boundary::Polygon(p),
        geo::Geometry::MultiPolygon(mp) => Boundary::MultiPolygon(mp),
        other => {
            log::debug!("Ignoring non-polygon geometry for '{barrio}': {other:?}");
            return None;
        }
    };

    Some(NeighborhoodGeometry { barrio, boundary })
}

/// Converts a boundary into a `GeoJSON` geometry for renderers.
#[must_use]
pub fn boundary_geojson(boundary: &Boundary) -> geojson::Geometry {
    let value = match boundary {
        Boundary::Polygon(p) => geojson::Value::from(p),
        Boundary::MultiPolygon(mp) => geojson::Value::from(mp),
    };
    geojson::Geometry::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "properties": { "barrio": " Riomar " },
          "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] }
        },
        {
          "type": "Feature",
          "properties": { "barrio": "Las Flores" },
          "geometry": {
            "type": "MultiPolygon",
            "coordinates": [
              [[[0,0],[1,0],[1,1],[0,1],[0,0]]],
              [[[5,5],[7,5],[7,7],[5,7],[5,5]]]
            ]
          }
        },
        {
          "type": "Feature",
          "properties": { "nombre": "Sin barrio" },
          "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] }
        },
        {
          "type": "Feature",
          "properties": { "barrio": "Punto" },
          "geometry": { "type": "Point", "coordinates": [0,0] }
        }
      ]
    }"#;

    #[test]
    fn parses_polygons_and_multipolygons() {
        let boundaries = parse_boundaries(SAMPLE, DEFAULT_NAME_PROPERTY).unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].barrio, "Riomar");
        assert!(matches!(boundaries[0].boundary, Boundary::Polygon(_)));
        assert_eq!(boundaries[1].boundary.part_count(), 2);
    }

    #[test]
    fn custom_name_property() {
        let boundaries = parse_boundaries(SAMPLE, "nombre").unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].barrio, "Sin barrio");
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let err = parse_boundaries(r#"{"type":"Point","coordinates":[0,0]}"#, "barrio").unwrap_err();
        assert!(matches!(err, GeometryError::Conversion { .. }));
    }

    #[test]
    fn boundary_round_trips_to_geojson_type() {
        let boundaries = parse_boundaries(SAMPLE, DEFAULT_NAME_PROPERTY).unwrap();
        let geometry = boundary_geojson(&boundaries[1].boundary);
        assert!(matches!(geometry.value, geojson::Value::MultiPolygon(_)));
    }
}
