//! Loaded neighborhood geometry with precomputed label anchors.

use survey_map_geography_models::{Boundary, LabelAnchor, NeighborhoodGeometry};

use crate::{centroid, names};

/// One neighborhood outline ready for joining and rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryEntry {
    /// Name as it appears in the geometry source.
    pub barrio: String,
    /// Normalized name used for joining.
    pub key: String,
    /// Outline.
    pub boundary: Boundary,
    /// Label position. `None` for empty geometry.
    pub label_anchor: Option<LabelAnchor>,
}

/// All neighborhood geometry, in source order.
///
/// Anchors are computed once here and reused for every stat batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryIndex {
    entries: Vec<GeometryEntry>,
}

impl GeometryIndex {
    #[must_use]
    pub fn new(geometries: Vec<NeighborhoodGeometry>) -> Self {
        let entries: Vec<GeometryEntry> = geometries
            .into_iter()
            .map(|geometry| {
                let label_anchor = centroid::centroid(&geometry.boundary);
                if label_anchor.is_none() {
                    log::warn!("Neighborhood '{}' has empty geometry", geometry.barrio);
                }
                GeometryEntry {
                    key: names::normalize_name(&geometry.barrio),
                    barrio: geometry.barrio,
                    boundary: geometry.boundary,
                    label_anchor,
                }
            })
            .collect();

        log::debug!("Indexed {} neighborhood geometries", entries.len());

        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[GeometryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose name matches `barrio`: an exact key, else the one key
    /// it partially matches. Several entries can share one name.
    #[must_use]
    pub fn find(&self, barrio: &str) -> Vec<&GeometryEntry> {
        let key = names::normalize_name(barrio);
        let Some(matched) = names::match_name(&key, self.entries.iter().map(|e| e.key.as_str()))
        else {
            return Vec::new();
        };
        self.entries.iter().filter(|e| e.key == matched).collect()
    }
}

impl FromIterator<NeighborhoodGeometry> for GeometryIndex {
    fn from_iter<T: IntoIterator<Item = NeighborhoodGeometry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn neighborhood(name: &str, x0: f64) -> NeighborhoodGeometry {
        NeighborhoodGeometry {
            barrio: name.to_string(),
            boundary: Boundary::Polygon(polygon![
                (x: x0, y: 0.0),
                (x: x0 + 2.0, y: 0.0),
                (x: x0 + 2.0, y: 2.0),
                (x: x0, y: 2.0),
            ]),
        }
    }

    #[test]
    fn anchors_are_precomputed() {
        let index = GeometryIndex::new(vec![neighborhood("Riomar", 0.0)]);
        let entry = &index.entries()[0];
        assert_eq!(entry.key, "riomar");
        assert_eq!(entry.label_anchor, Some(LabelAnchor::new(1.0, 1.0)));
    }

    #[test]
    fn find_normalizes_and_returns_duplicates() {
        let index: GeometryIndex = vec![
            neighborhood("Las Flores", 0.0),
            neighborhood("LAS FLORES", 10.0),
            neighborhood("Riomar", 20.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(index.find("  las   flores").len(), 2);
        assert_eq!(index.find("rio").len(), 1);
        assert!(index.find("El Prado").is_empty());
    }
}
