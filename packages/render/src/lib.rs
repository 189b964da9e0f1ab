#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Render feed.
//!
//! Joins one [`StatBatch`] with the loaded [`GeometryIndex`] and the
//! choropleth style into flat [`RenderRecord`]s that a map renderer can
//! paint without further lookups.
//!
//! The join walks the geometry: every outline yields one record, styled
//! by its matched statistic or drawn empty when no statistic matches.
//! Statistics that match no outline are reported in
//! [`RenderBatch::join_misses`] and otherwise dropped.

use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use survey_map_geography::{GeometryEntry, GeometryIndex, boundary_geojson, names};
use survey_map_geography_models::LabelAnchor;
use survey_map_stats::StatBatch;
use survey_map_style::LegendEntry;
use survey_map_survey_models::{NeighborhoodStat, QueryMode};

/// One neighborhood, ready to paint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRecord {
    /// Name from the geometry source.
    pub barrio: String,
    /// Locality reported by the store, when a statistic matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localidad: Option<String>,
    /// Outline.
    pub geometry: geojson::Geometry,
    /// Where to draw the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_anchor: Option<LabelAnchor>,
    /// Hex fill color.
    pub fill_color: String,
    /// Fill opacity in `[0, 1]`.
    pub fill_opacity: f64,
    /// Matched statistic for the tooltip, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<NeighborhoodStat>,
}

/// Everything painted for one resolved query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBatch {
    /// Generation of the request that produced the statistics.
    pub generation: u64,
    /// Whether the batch carries match semantics.
    pub mode: QueryMode,
    /// Largest match count; all intensities are relative to it.
    pub max_matches: u64,
    /// One record per geometry outline.
    pub records: Vec<RenderRecord>,
    /// Number of records that carry a statistic.
    pub joined: usize,
    /// Store neighborhood names with no matching outline.
    pub join_misses: Vec<String>,
    /// Legend for filtered batches; empty in the general view.
    pub legend: Vec<LegendEntry>,
}

impl RenderBatch {
    /// One-line description for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "generation {} ({}): {} records, {} joined, {} misses, max matches {}",
            self.generation,
            self.mode,
            self.records.len(),
            self.joined,
            self.join_misses.len(),
            self.max_matches
        )
    }
}

/// Joins statistics against a fixed set of outlines.
#[derive(Debug, Clone, Default)]
pub struct RenderFeed {
    geometry: Arc<GeometryIndex>,
}

impl RenderFeed {
    #[must_use]
    pub const fn new(geometry: Arc<GeometryIndex>) -> Self {
        Self { geometry }
    }

    #[must_use]
    pub fn geometry(&self) -> &GeometryIndex {
        &self.geometry
    }

    /// Builds the render batch for `batch`.
    #[must_use]
    pub fn render(&self, generation: u64, batch: &StatBatch) -> RenderBatch {
        let lookup = StatLookup::new(&batch.stats);
        let general = batch.is_general();

        let entries = self.geometry.entries();
        let matched = lookup.join(entries);

        let mut used = BTreeSet::new();
        let records: Vec<RenderRecord> = entries
            .iter()
            .zip(matched)
            .map(|(entry, stat)| {
                if let Some(stat) = stat {
                    used.insert(stat.barrio.as_str());
                }
                record(entry, stat, general, batch.max_matches)
            })
            .collect();

        let join_misses = lookup.misses(&used);
        if !join_misses.is_empty() {
            if self.geometry.is_empty() {
                log::debug!("No geometry loaded yet; {} statistics unjoined", join_misses.len());
            } else {
                log::warn!(
                    "{} neighborhoods have no matching geometry: {}",
                    join_misses.len(),
                    join_misses.join(", ")
                );
            }
        }

        let legend = if general {
            Vec::new()
        } else {
            survey_map_style::legend(batch.max_matches)
        };

        let rendered = RenderBatch {
            generation,
            mode: batch.mode,
            max_matches: batch.max_matches,
            joined: records.iter().filter(|r| r.stat.is_some()).count(),
            records,
            join_misses,
            legend,
        };

        log::debug!("Rendered {}", rendered.summary());

        rendered
    }
}

fn record(
    entry: &GeometryEntry,
    stat: Option<&NeighborhoodStat>,
    general: bool,
    max_matches: u64,
) -> RenderRecord {
    let fill = if general {
        survey_map_style::general_style()
    } else {
        survey_map_style::style(stat.map_or(0, |s| s.matches_count), max_matches)
    };

    RenderRecord {
        barrio: entry.barrio.clone(),
        localidad: stat.map(|s| s.localidad.clone()),
        geometry: boundary_geojson(&entry.boundary),
        label_anchor: entry.label_anchor,
        fill_color: fill.fill_color,
        fill_opacity: fill.fill_opacity,
        stat: stat.cloned(),
    }
}

/// Statistics keyed by normalized name. The first record for a name wins.
struct StatLookup<'a> {
    by_key: BTreeMap<String, &'a NeighborhoodStat>,
}

impl<'a> StatLookup<'a> {
    fn new(stats: &'a [NeighborhoodStat]) -> Self {
        let mut by_key = BTreeMap::new();
        for stat in stats {
            match by_key.entry(names::normalize_name(&stat.barrio)) {
                Entry::Vacant(slot) => {
                    slot.insert(stat);
                }
                Entry::Occupied(_) => {
                    log::warn!("Duplicate statistics for '{}'; keeping the first", stat.barrio);
                }
            }
        }
        Self { by_key }
    }

    /// The statistic for each entry, in entry order.
    fn join(&self, entries: &[GeometryEntry]) -> Vec<Option<&'a NeighborhoodStat>> {
        let outlines: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        let stats: Vec<&str> = self.by_key.keys().map(String::as_str).collect();
        names::join_keys(&outlines, &stats)
            .into_iter()
            .map(|key| key.and_then(|key| self.by_key.get(key).copied()))
            .collect()
    }

    fn misses(&self, used: &BTreeSet<&str>) -> Vec<String> {
        self.by_key
            .values()
            .filter(|s| !used.contains(s.barrio.as_str()))
            .map(|s| s.barrio.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use survey_map_geography_models::{Boundary, NeighborhoodGeometry};
    use survey_map_survey_models::NeighborhoodCount;

    use super::*;

    fn outline(name: &str, x0: f64) -> NeighborhoodGeometry {
        NeighborhoodGeometry {
            barrio: name.to_string(),
            boundary: Boundary::Polygon(polygon![
                (x: x0, y: 0.0),
                (x: x0 + 1.0, y: 0.0),
                (x: x0 + 1.0, y: 1.0),
                (x: x0, y: 1.0),
            ]),
        }
    }

    fn feed() -> RenderFeed {
        RenderFeed::new(Arc::new(GeometryIndex::new(vec![
            outline("Riomar", 0.0),
            outline("Villa Country", 2.0),
            outline("El Prado", 4.0),
        ])))
    }

    fn count(barrio: &str, total: i64, matches: Option<i64>) -> NeighborhoodCount {
        NeighborhoodCount {
            barrio: barrio.to_string(),
            localidad: "Riomar".to_string(),
            coordx: 0.0,
            coordsy: 0.0,
            total_encuestas: total,
            matches_count: matches,
        }
    }

    fn filtered(counts: Vec<NeighborhoodCount>) -> StatBatch {
        survey_map_stats::normalize(QueryMode::Filtered, counts).unwrap()
    }

    #[test]
    fn general_batch_uses_neutral_styling() {
        let batch = survey_map_stats::normalize(
            QueryMode::General,
            vec![count("Riomar", 100, None), count("El Prado", 50, None)],
        )
        .unwrap();

        let rendered = feed().render(1, &batch);

        assert_eq!(rendered.mode, QueryMode::General);
        assert!(rendered.legend.is_empty());
        for record in &rendered.records {
            assert_eq!(record.fill_color, survey_map_style::NEUTRAL_COLOR);
            assert!((record.fill_opacity - survey_map_style::GENERAL_OPACITY).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn records_follow_geometry_and_carry_stats() {
        let batch = filtered(vec![
            count("RIOMAR", 100, Some(40)),
            count("country", 10, Some(2)),
        ]);

        let rendered = feed().render(7, &batch);

        assert_eq!(rendered.generation, 7);
        assert_eq!(rendered.records.len(), 3);
        assert_eq!(rendered.joined, 2);
        assert!(rendered.join_misses.is_empty());

        let riomar = &rendered.records[0];
        assert_eq!(riomar.barrio, "Riomar");
        assert_eq!(riomar.fill_color, "#4d0000");
        assert!((riomar.fill_opacity - 1.0).abs() < f64::EPSILON);
        assert_eq!(riomar.label_anchor, Some(LabelAnchor::new(0.5, 0.5)));
        let stat = riomar.stat.as_ref().unwrap();
        assert!((stat.match_percentage - 40.0).abs() < f64::EPSILON);

        let prado = &rendered.records[2];
        assert!(prado.stat.is_none());
        assert_eq!(prado.fill_color, survey_map_style::NEUTRAL_COLOR);
        assert!((prado.fill_opacity - survey_map_style::EMPTY_OPACITY).abs() < f64::EPSILON);
        assert_eq!(rendered.legend.len(), 5);
    }

    #[test]
    fn unmatched_stats_are_reported_and_excluded() {
        let batch = filtered(vec![
            count("Riomar", 100, Some(40)),
            count("Barrio Abajo", 30, Some(5)),
        ]);

        let rendered = feed().render(2, &batch);

        assert_eq!(rendered.join_misses, vec!["Barrio Abajo".to_string()]);
        assert!(
            rendered
                .records
                .iter()
                .all(|r| r.barrio != "Barrio Abajo")
        );
    }

    #[test]
    fn duplicate_stat_names_keep_the_first() {
        let batch = filtered(vec![
            count("Riomar", 100, Some(40)),
            count("riomar", 10, Some(1)),
        ]);

        let rendered = feed().render(3, &batch);

        let riomar = rendered.records[0].stat.as_ref().unwrap();
        assert_eq!(riomar.matches_count, 40);
        assert!(rendered.join_misses.is_empty());
    }

    #[test]
    fn duplicate_outlines_share_a_stat() {
        let feed = RenderFeed::new(Arc::new(GeometryIndex::new(vec![
            outline("Riomar", 0.0),
            outline("Riomar", 5.0),
        ])));
        let rendered = feed.render(1, &filtered(vec![count("Riomar", 10, Some(5))]));
        assert_eq!(rendered.joined, 2);
    }

    #[test]
    fn partial_names_do_not_borrow_an_exactly_matched_stat() {
        let feed = RenderFeed::new(Arc::new(GeometryIndex::new(vec![
            outline("Villa", 0.0),
            outline("Villa Santos", 2.0),
            outline("Villa Country", 4.0),
        ])));

        let rendered = feed.render(1, &filtered(vec![count("Villa", 10, Some(9))]));

        assert_eq!(rendered.joined, 1);
        assert_eq!(rendered.records[0].stat.as_ref().unwrap().barrio, "Villa");
        for record in &rendered.records[1..] {
            assert!(record.stat.is_none(), "{} borrowed a stat", record.barrio);
            assert_eq!(record.fill_color, survey_map_style::NEUTRAL_COLOR);
            assert!((record.fill_opacity - survey_map_style::EMPTY_OPACITY).abs() < f64::EPSILON);
        }
        assert!(rendered.join_misses.is_empty());
    }

    #[test]
    fn record_serializes_camel_case() {
        let rendered = feed().render(1, &filtered(vec![count("Riomar", 100, Some(40))]));
        let json = serde_json::to_value(&rendered.records[0]).unwrap();
        assert_eq!(json["fillColor"], "#4d0000");
        assert_eq!(json["geometry"]["type"], "Polygon");
        assert!(json["labelAnchor"]["x"].is_number());
        assert!(json.get("localidad").is_some());
    }
}
