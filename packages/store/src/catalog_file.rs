//! Question catalog definitions in TOML.
//!
//! ```toml
//! [[categories]]
//! name = "Salud"
//!
//! [[categories.questions]]
//! id = "43"
//! text = "Afiliación al sistema de salud"
//! ```

use std::path::Path;

use serde::Deserialize;
use survey_map_survey_models::{Question, QuestionCatalog};

use crate::StoreError;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    categories: Vec<CategoryDocument>,
}

#[derive(Debug, Deserialize)]
struct CategoryDocument {
    name: String,
    #[serde(default)]
    questions: Vec<QuestionDocument>,
}

#[derive(Debug, Deserialize)]
struct QuestionDocument {
    id: String,
    text: String,
    #[serde(default)]
    responses: u32,
}

/// Parses a catalog from TOML text.
///
/// # Errors
///
/// Returns [`StoreError::Catalog`] if the document does not match the
/// catalog schema.
pub fn parse_catalog(toml_str: &str) -> Result<QuestionCatalog, StoreError> {
    let document: CatalogDocument = toml::de::from_str(toml_str)?;

    Ok(QuestionCatalog::from_questions(
        document.categories.into_iter().flat_map(|category| {
            let name = category.name;
            category.questions.into_iter().map(move |q| Question {
                category: name.clone(),
                question_id: q.id.trim().to_string(),
                text: q.text,
                response_count: q.responses,
            })
        }),
    ))
}

/// Reads and parses a catalog file.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be read or parsed.
pub fn load_catalog(path: &Path) -> Result<QuestionCatalog, StoreError> {
    let catalog = parse_catalog(&std::fs::read_to_string(path)?)?;
    log::info!(
        "Loaded catalog with {} questions from {}",
        catalog.len(),
        path.display()
    );
    Ok(catalog)
}
