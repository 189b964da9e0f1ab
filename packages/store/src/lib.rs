#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Survey store abstraction.
//!
//! The aggregation engine never talks to a backend directly; it is handed
//! an `Arc<dyn SurveyStore>`. Two implementations ship here: an in-memory
//! store over respondent rows (loaded from CSV) and an HTTP adapter for a
//! remote RPC backend. [`CatalogCache`] memoizes the catalog listings on
//! top of either.

pub mod cache;
pub mod catalog_file;
pub mod csv_source;
pub mod http;
pub mod memory;
mod retry;

use async_trait::async_trait;
use survey_map_survey_models::{Filter, NeighborhoodCount, Question, ResponseOption};

pub use cache::CatalogCache;
pub use http::HttpSurveyStore;
pub use memory::{MemoryStore, Respondent};

/// Errors that can occur while querying a survey store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Respondent CSV could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Catalog TOML could not be parsed.
    #[error("Catalog parse error: {0}")]
    Catalog(#[from] toml::de::Error),

    /// The backend rejected or failed the request.
    #[error("Store error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

/// Respondent store the aggregation engine queries.
///
/// Implementations report failures as errors; an empty aggregation result
/// is returned as-is and interpreted by the caller. There are no
/// partial-success semantics.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Per-neighborhood respondent totals and, when `filters` is non-empty,
    /// the number of respondents satisfying every filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    async fn aggregate(&self, filters: &[Filter]) -> Result<Vec<NeighborhoodCount>, StoreError>;

    /// Question category names.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    async fn list_categories(&self) -> Result<Vec<String>, StoreError>;

    /// Questions within a category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    async fn list_questions(&self, category: &str) -> Result<Vec<Question>, StoreError>;

    /// Recorded responses to a question with counts and percentages.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    async fn list_responses(
        &self,
        question_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<ResponseOption>, StoreError>;
}
