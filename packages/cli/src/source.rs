//! Store selection from command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use survey_map_store::{HttpSurveyStore, MemoryStore, SurveyStore, catalog_file, csv_source};

use crate::CliError;

/// Environment variable consulted when `--api-key` is not given.
const API_KEY_VAR: &str = "SURVEY_MAP_API_KEY";

/// Where survey responses come from.
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Respondent CSV (one row per respondent, one column per question)
    #[arg(long, requires = "catalog", conflicts_with = "store_url")]
    pub respondents: Option<PathBuf>,

    /// Question catalog TOML used with --respondents
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Base URL of a remote survey API
    #[arg(long)]
    pub store_url: Option<String>,

    /// API key for --store-url (defaults to $SURVEY_MAP_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,
}

impl StoreArgs {
    /// Opens the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] if no store is configured or local files cannot
    /// be loaded.
    pub fn open(&self) -> Result<Arc<dyn SurveyStore>, CliError> {
        if let Some(url) = &self.store_url {
            let api_key = self
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_VAR).ok());
            log::info!("Using remote survey store at {url}");
            return Ok(Arc::new(HttpSurveyStore::new(url.as_str(), api_key)));
        }

        match (&self.respondents, &self.catalog) {
            (Some(respondents), Some(catalog)) => {
                let catalog = catalog_file::load_catalog(catalog)?;
                let respondents = csv_source::load_respondents(respondents)?;
                log::info!(
                    "Using in-memory store: {} respondents, {} questions",
                    respondents.len(),
                    catalog.len()
                );
                Ok(Arc::new(MemoryStore::new(catalog, respondents)))
            }
            _ => Err(CliError::Usage {
                message: "pass --respondents with --catalog, or --store-url".to_string(),
            }),
        }
    }
}
