//! Memoized catalog listings.
//!
//! Questions and their response listings do not change while the
//! application runs, so they are fetched from the store once and shared.

use std::collections::BTreeMap;
use std::sync::Arc;

use survey_map_survey_models::{QuestionCatalog, ResponseOption};
use tokio::sync::{Mutex, OnceCell};

use crate::{StoreError, SurveyStore};

/// Caches the question catalog and per-question response listings.
pub struct CatalogCache {
    store: Arc<dyn SurveyStore>,
    catalog: OnceCell<Arc<QuestionCatalog>>,
    responses: Mutex<BTreeMap<String, Arc<Vec<ResponseOption>>>>,
}

impl CatalogCache {
    /// Creates an empty cache in front of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self {
            store,
            catalog: OnceCell::new(),
            responses: Mutex::new(BTreeMap::new()),
        }
    }

    /// The full catalog, loaded on first use.
    ///
    /// A failed load is not cached; the next call retries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if listing categories or questions fails.
    pub async fn catalog(&self) -> Result<Arc<QuestionCatalog>, StoreError> {
        self.catalog
            .get_or_try_init(|| async {
                let categories = self.store.list_categories().await?;
                let mut questions = Vec::new();
                for category in &categories {
                    questions.extend(self.store.list_questions(category).await?);
                }
                let catalog = QuestionCatalog::from_questions(questions);
                log::info!(
                    "Cached catalog: {} categories, {} questions",
                    categories.len(),
                    catalog.len()
                );
                Ok::<_, StoreError>(Arc::new(catalog))
            })
            .await
            .cloned()
    }

    /// Recorded responses for a question, loaded on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the catalog or the response listing cannot
    /// be loaded.
    pub async fn responses(&self, question_id: &str) -> Result<Arc<Vec<ResponseOption>>, StoreError> {
        if let Some(cached) = self.responses.lock().await.get(question_id) {
            return Ok(Arc::clone(cached));
        }

        let catalog = self.catalog().await?;
        let category = catalog.category_of(question_id);
        let listing = Arc::new(self.store.list_responses(question_id, category).await?);

        self.responses
            .lock()
            .await
            .insert(question_id.to_string(), Arc::clone(&listing));
        Ok(listing)
    }
}
