//! Remote [`SurveyStore`] over an RPC-style JSON HTTP API.
//!
//! Each store operation maps to `POST {base_url}/rpc/{function}` with a
//! JSON argument object, the convention used by PostgREST-style backends.
//! An optional API key is sent both as `apikey` and as a bearer token.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use survey_map_survey_models::{Filter, NeighborhoodCount, Question, ResponseOption};

use crate::{StoreError, SurveyStore, retry};

const AGGREGATE_FN: &str = "aggregate_by_barrio";
const CATEGORIES_FN: &str = "list_categories";
const QUESTIONS_FN: &str = "list_questions";
const RESPONSES_FN: &str = "list_responses";

/// Survey store backed by a remote HTTP API.
pub struct HttpSurveyStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpSurveyStore {
    /// Creates a store for the API rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn function_url(&self, function: &str) -> String {
        format!("{}/rpc/{function}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        args: serde_json::Value,
    ) -> Result<T, StoreError> {
        let url = self.function_url(function);
        log::debug!("POST {url}");

        let body = retry::send_json(|| {
            let request = self.client.post(&url).json(&args);
            match &self.api_key {
                Some(key) => request.header("apikey", key).bearer_auth(key),
                None => request,
            }
        })
        .await?;

        Ok(serde_json::from_value(body)?)
    }
}

#[async_trait]
impl SurveyStore for HttpSurveyStore {
    async fn aggregate(&self, filters: &[Filter]) -> Result<Vec<NeighborhoodCount>, StoreError> {
        self.call(AGGREGATE_FN, serde_json::json!({ "filters": filters }))
            .await
    }

    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        self.call(CATEGORIES_FN, serde_json::json!({})).await
    }

    async fn list_questions(&self, category: &str) -> Result<Vec<Question>, StoreError> {
        self.call(QUESTIONS_FN, serde_json::json!({ "category": category }))
            .await
    }

    async fn list_responses(
        &self,
        question_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<ResponseOption>, StoreError> {
        self.call(
            RESPONSES_FN,
            serde_json::json!({ "questionId": question_id, "category": category }),
        )
        .await
    }
}
