#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stat normalizer.
//!
//! Turns the raw per-neighborhood counts a [`SurveyStore`] returns into a
//! [`StatBatch`] whose records all satisfy
//! `0 <= matches_count <= total_encuestas` and
//! `0 <= match_percentage <= 100`. The intensity score is the match count
//! itself; rescaling against the batch maximum happens in the style layer,
//! so scores are only comparable within one batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use survey_map_store::{StoreError, SurveyStore};
use survey_map_survey_models::{Filter, NeighborhoodCount, NeighborhoodStat, QueryMode};
use thiserror::Error;

/// The aggregation could not produce a usable batch.
///
/// Always distinct from a batch in which every neighborhood has zero
/// matches.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// The store reported an error.
    #[error("Survey store error: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer within the allotted time.
    #[error("Aggregation timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with no neighborhoods at all.
    #[error("Survey store returned no neighborhoods")]
    Empty,
}

/// Normalized statistics for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatBatch {
    /// Whether the batch carries match semantics.
    pub mode: QueryMode,
    /// One record per neighborhood, in store order. Not de-duplicated.
    pub stats: Vec<NeighborhoodStat>,
    /// Largest `matches_count` in this batch.
    pub max_matches: u64,
}

impl StatBatch {
    /// Whether this is a general (unfiltered) batch.
    #[must_use]
    pub fn is_general(&self) -> bool {
        self.mode == QueryMode::General
    }

    /// Sum of `total_encuestas` across the batch.
    #[must_use]
    pub fn total_respondents(&self) -> u64 {
        self.stats.iter().map(|s| s.total_encuestas).sum()
    }

    /// Sum of `matches_count` across the batch.
    #[must_use]
    pub fn total_matches(&self) -> u64 {
        self.stats.iter().map(|s| s.matches_count).sum()
    }
}

/// `matches / total * 100`, clamped to `[0, 100]`; zero when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn match_percentage(matches: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (matches as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Normalizes raw counts for a query in `mode`.
///
/// Records with a non-positive total are kept with zero totals and
/// matches. Match counts outside `[0, total]` are clamped and logged.
/// In [`QueryMode::General`] every match count is zero.
///
/// # Errors
///
/// Returns [`AggregationError::Empty`] if `counts` is empty.
pub fn normalize(
    mode: QueryMode,
    counts: Vec<NeighborhoodCount>,
) -> Result<StatBatch, AggregationError> {
    if counts.is_empty() {
        return Err(AggregationError::Empty);
    }

    let stats: Vec<NeighborhoodStat> = counts
        .into_iter()
        .map(|raw| normalize_record(mode, raw))
        .collect();
    let max_matches = stats.iter().map(|s| s.matches_count).max().unwrap_or(0);

    log::debug!(
        "Normalized {} neighborhoods ({mode}), max matches {max_matches}",
        stats.len()
    );

    Ok(StatBatch {
        mode,
        stats,
        max_matches,
    })
}

#[allow(clippy::cast_precision_loss)]
fn normalize_record(mode: QueryMode, raw: NeighborhoodCount) -> NeighborhoodStat {
    let total = u64::try_from(raw.total_encuestas).unwrap_or(0);

    let matches = match (mode, raw.matches_count) {
        (QueryMode::General, _) | (QueryMode::Filtered, None) => 0,
        (QueryMode::Filtered, Some(reported)) => {
            let clamped = u64::try_from(reported).unwrap_or(0).min(total);
            if i64::try_from(clamped).ok() != Some(reported) {
                log::warn!(
                    "Clamped matches for '{}' from {reported} to {clamped} (total {total})",
                    raw.barrio
                );
            }
            clamped
        }
    };

    NeighborhoodStat {
        barrio: raw.barrio,
        localidad: raw.localidad,
        coordx: raw.coordx,
        coordsy: raw.coordsy,
        total_encuestas: total,
        matches_count: matches,
        match_percentage: match_percentage(matches, total),
        intensity_score: matches as f64,
    }
}

/// Queries `store` for `filters` and normalizes the result.
///
/// An empty filter list issues the general query.
///
/// # Errors
///
/// Returns [`AggregationError`] if the store fails or returns nothing.
pub async fn aggregate(
    store: &dyn SurveyStore,
    filters: &[Filter],
) -> Result<StatBatch, AggregationError> {
    let mode = QueryMode::for_filters(filters);
    log::debug!("Aggregating {} filters ({mode})", filters.len());
    let counts = store.aggregate(filters).await?;
    normalize(mode, counts)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use survey_map_survey_models::{Question, ResponseOption};

    use super::*;

    fn raw(barrio: &str, total: i64, matches: Option<i64>) -> NeighborhoodCount {
        NeighborhoodCount {
            barrio: barrio.to_string(),
            localidad: "Riomar".to_string(),
            coordx: -74.8,
            coordsy: 11.0,
            total_encuestas: total,
            matches_count: matches,
        }
    }

    #[test]
    fn riomar_forty_of_hundred_is_forty_percent() {
        let batch = normalize(QueryMode::Filtered, vec![raw("Riomar", 100, Some(40))]).unwrap();
        let riomar = &batch.stats[0];
        assert!((riomar.match_percentage - 40.0).abs() < f64::EPSILON);
        assert!((riomar.intensity_score - 40.0).abs() < f64::EPSILON);
        assert_eq!(batch.max_matches, 40);
    }

    #[test]
    fn inconsistent_counts_are_clamped() {
        let batch = normalize(
            QueryMode::Filtered,
            vec![
                raw("A", 10, Some(15)),
                raw("B", 0, Some(3)),
                raw("C", -4, Some(1)),
                raw("D", 20, Some(-2)),
                raw("E", 8, None),
            ],
        )
        .unwrap();

        for stat in &batch.stats {
            assert!(stat.matches_count <= stat.total_encuestas, "{stat:?}");
            assert!((0.0..=100.0).contains(&stat.match_percentage), "{stat:?}");
        }
        assert_eq!(batch.stats[0].matches_count, 10);
        assert!((batch.stats[0].match_percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(batch.stats[1].total_encuestas, 0);
        assert!(batch.stats[1].match_percentage.abs() < f64::EPSILON);
        assert_eq!(batch.stats[2].total_encuestas, 0);
        assert_eq!(batch.stats[3].matches_count, 0);
        assert_eq!(batch.max_matches, 10);
    }

    #[test]
    fn general_batch_has_no_matches() {
        let batch = normalize(QueryMode::General, vec![raw("Riomar", 100, Some(40))]).unwrap();
        assert!(batch.is_general());
        assert_eq!(batch.stats[0].matches_count, 0);
        assert_eq!(batch.max_matches, 0);
        assert_eq!(batch.total_respondents(), 100);
    }

    #[test]
    fn empty_result_is_an_aggregation_failure() {
        assert!(matches!(
            normalize(QueryMode::Filtered, Vec::new()),
            Err(AggregationError::Empty)
        ));
    }

    #[test]
    fn duplicate_names_are_kept() {
        let batch = normalize(
            QueryMode::Filtered,
            vec![raw("Riomar", 10, Some(1)), raw("Riomar", 5, Some(2))],
        )
        .unwrap();
        assert_eq!(batch.stats.len(), 2);
        assert_eq!(batch.total_matches(), 3);
    }

    struct FixedStore(Result<Vec<NeighborhoodCount>, String>);

    #[async_trait]
    impl SurveyStore for FixedStore {
        async fn aggregate(&self, filters: &[Filter]) -> Result<Vec<NeighborhoodCount>, StoreError> {
            assert_eq!(filters.len(), 1);
            self.0
                .clone()
                .map_err(|message| StoreError::Backend { message })
        }

        async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_questions(&self, _category: &str) -> Result<Vec<Question>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_responses(
            &self,
            _question_id: &str,
            _category: Option<&str>,
        ) -> Result<Vec<ResponseOption>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn sisben() -> Filter {
        Filter {
            question_id: "43".to_string(),
            category: None,
            response: "Subsidiado / SISBÉN".to_string(),
        }
    }

    #[tokio::test]
    async fn aggregate_normalizes_store_result() {
        let store = FixedStore(Ok(vec![raw("Riomar", 100, Some(40))]));
        let batch = aggregate(&store, &[sisben()]).await.unwrap();
        assert_eq!(batch.mode, QueryMode::Filtered);
        assert!((batch.stats[0].match_percentage - 40.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn store_errors_become_aggregation_failures() {
        let store = FixedStore(Err("connection refused".to_string()));
        let err = aggregate(&store, &[sisben()]).await.unwrap_err();
        assert!(matches!(err, AggregationError::Store(_)));
    }
}
