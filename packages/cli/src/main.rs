#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the survey map.
//!
//! ```text
//! survey_map render --respondents data.csv --catalog catalog.toml \
//!     --geometry barrios.geojson --filter "43=Subsidiado / SISBÉN"
//! survey_map legend --max 40
//! survey_map questions --respondents data.csv --catalog catalog.toml [--category Salud]
//! survey_map responses --store-url https://api.example.org --question 43
//! ```
//!
//! Output is JSON on stdout; logs go to stderr and are controlled by
//! `RUST_LOG`.

mod source;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use survey_map_geography::{DEFAULT_NAME_PROPERTY, GeometryIndex};
use survey_map_session::{MapSession, QueryOutcome, RenderState, SessionConfig, SessionError};
use survey_map_store::{CatalogCache, StoreError};
use survey_map_survey_models::Question;
use thiserror::Error;

use crate::source::StoreArgs;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Store setup or query failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Session setup or a filter change failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The aggregation failed after all re-issues.
    #[error("Aggregation failed: {message}")]
    Aggregation {
        /// Final error reported by the session.
        message: String,
    },

    /// Flags are missing or inconsistent.
    #[error("{message}")]
    Usage {
        /// What to pass instead.
        message: String,
    },
}

#[derive(Parser)]
#[command(name = "survey_map", about = "Render survey responses as a neighborhood choropleth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate under a set of filters and print the render batch
    Render {
        #[command(flatten)]
        store: StoreArgs,

        /// Neighborhood boundaries (GeoJSON FeatureCollection)
        #[arg(long)]
        geometry: PathBuf,

        /// Feature property holding the neighborhood name
        #[arg(long, default_value = DEFAULT_NAME_PROPERTY)]
        name_property: String,

        /// Filter as QUESTION_ID=RESPONSE; repeat for AND
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,

        /// Session timing config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print a one-line summary instead of the full batch
        #[arg(long)]
        summary: bool,
    },
    /// Print legend entries for a batch maximum
    Legend {
        /// Largest match count in the batch
        #[arg(long)]
        max: u64,
    },
    /// List catalog questions
    Questions {
        #[command(flatten)]
        store: StoreArgs,

        /// Only questions in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// List recorded responses for a question
    Responses {
        #[command(flatten)]
        store: StoreArgs,

        /// Question id
        #[arg(long)]
        question: String,
    },
}

fn parse_filter(value: &str) -> Result<(String, String), String> {
    let (question_id, response) = value
        .split_once('=')
        .ok_or_else(|| format!("expected QUESTION_ID=RESPONSE, got '{value}'"))?;
    Ok((question_id.trim().to_string(), response.trim().to_string()))
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            store,
            geometry,
            name_property,
            filters,
            config,
            summary,
        } => {
            let config = match config {
                Some(path) => SessionConfig::load(&path)?,
                None => SessionConfig::default(),
            };
            render(&store, geometry, name_property, &filters, config, summary).await?;
        }
        Commands::Legend { max } => print_json(&survey_map_style::legend(max))?,
        Commands::Questions { store, category } => {
            let cache = CatalogCache::new(store.open()?);
            let catalog = cache.catalog().await?;
            let questions: Vec<&Question> = match category.as_deref() {
                Some(category) => catalog.questions(category).iter().collect(),
                None => catalog
                    .categories()
                    .flat_map(|c| catalog.questions(c))
                    .collect(),
            };
            print_json(&questions)?;
        }
        Commands::Responses { store, question } => {
            let cache = CatalogCache::new(store.open()?);
            let responses = cache.responses(&question).await?;
            print_json(responses.as_ref())?;
        }
    }

    Ok(())
}

async fn render(
    store: &StoreArgs,
    geometry: PathBuf,
    name_property: String,
    filters: &[(String, String)],
    config: SessionConfig,
    summary: bool,
) -> Result<(), CliError> {
    let store = store.open()?;
    let mut session = MapSession::new(Arc::clone(&store), config);

    let geometry_load = session.load_geometry(move || {
        survey_map_geography::load_boundaries(&geometry, &name_property).map(GeometryIndex::new)
    });

    let catalog = CatalogCache::new(store).catalog().await?;

    let mut ticket = None;
    for (question_id, response) in filters {
        if let Some(submitted) = session.add_validated(&catalog, question_id, response)? {
            ticket = Some(submitted);
        }
    }
    let ticket = ticket.unwrap_or_else(|| session.refresh());

    let outlines = geometry_load.await.map_err(SessionError::from)??;
    log::debug!("{outlines} outlines ready");

    if let QueryOutcome::Failed(message) = ticket.outcome().await {
        return Err(CliError::Aggregation { message });
    }

    match session.render_state() {
        RenderState::Ready(batch) => {
            log::info!("{}", batch.summary());
            if summary {
                println!("{}", batch.summary());
                Ok(())
            } else {
                print_json(batch.as_ref())
            }
        }
        RenderState::Failed { error, .. } => Err(CliError::Aggregation { message: error }),
        RenderState::Idle | RenderState::Pending { .. } => Err(CliError::Aggregation {
            message: "no result was published".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_flag_splits_on_first_equals() {
        assert_eq!(
            parse_filter("43 = Subsidiado / SISBÉN").unwrap(),
            ("43".to_string(), "Subsidiado / SISBÉN".to_string())
        );
        assert_eq!(
            parse_filter("12=a=b").unwrap(),
            ("12".to_string(), "a=b".to_string())
        );
        assert!(parse_filter("43").is_err());
    }

    #[test]
    fn cli_parses_repeated_filters() {
        let cli = Cli::try_parse_from([
            "survey_map",
            "render",
            "--respondents",
            "data.csv",
            "--catalog",
            "catalog.toml",
            "--geometry",
            "barrios.geojson",
            "--filter",
            "43=Contributivo",
            "--filter",
            "7=Si",
        ])
        .unwrap();
        let Commands::Render {
            filters,
            name_property,
            ..
        } = cli.command
        else {
            panic!("expected render");
        };
        assert_eq!(filters.len(), 2);
        assert_eq!(name_property, DEFAULT_NAME_PROPERTY);
    }

    #[test]
    fn respondents_require_catalog() {
        assert!(
            Cli::try_parse_from(["survey_map", "questions", "--respondents", "data.csv"]).is_err()
        );
    }
}
