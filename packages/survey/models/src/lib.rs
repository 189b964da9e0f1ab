#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Survey question, filter, and neighborhood statistic types.
//!
//! These types are shared by every stage of the pipeline: the question
//! catalog the analyst browses, the filters they compose, the raw
//! per-neighborhood counts a survey store returns, and the normalized
//! statistics handed to the render feed.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A survey question as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Category the question belongs to (e.g. "Salud").
    pub category: String,
    /// Question identifier as it appears in respondent rows (e.g. "43").
    pub question_id: String,
    /// Question wording shown to the analyst.
    pub text: String,
    /// Number of distinct responses recorded for this question.
    #[serde(default)]
    pub response_count: u32,
}

/// One possible answer to a question, with how often it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOption {
    /// Response value exactly as stored.
    pub value: String,
    /// Number of respondents that gave this response.
    pub count: u64,
    /// Share of respondents that answered the question, 0-100.
    pub percentage: f64,
}

/// A single `question = response` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Question being constrained.
    pub question_id: String,
    /// Category of the question, kept for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Response a respondent must have given.
    pub response: String,
}

/// Whether a query applies match semantics at all.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryMode {
    /// No filters: respondent totals only, `matches_count` is meaningless.
    General,
    /// At least one filter: every neighborhood carries a match count.
    Filtered,
}

impl QueryMode {
    /// Picks the mode implied by a filter list.
    #[must_use]
    pub const fn for_filters(filters: &[Filter]) -> Self {
        if filters.is_empty() {
            Self::General
        } else {
            Self::Filtered
        }
    }
}

/// Raw per-neighborhood counts exactly as a survey store reports them.
///
/// Counts are signed and unchecked; the stat normalizer is responsible for
/// turning them into a [`NeighborhoodStat`] that honors its invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodCount {
    /// Neighborhood name.
    pub barrio: String,
    /// Locality (district) containing the neighborhood.
    #[serde(default)]
    pub localidad: String,
    /// Representative x coordinate (longitude).
    #[serde(default)]
    pub coordx: f64,
    /// Representative y coordinate (latitude).
    #[serde(default)]
    pub coordsy: f64,
    /// Number of survey respondents in the neighborhood.
    pub total_encuestas: i64,
    /// Respondents satisfying every filter. Unset for general queries.
    #[serde(default)]
    pub matches_count: Option<i64>,
}

/// Normalized statistics for one neighborhood in one result batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodStat {
    /// Neighborhood name.
    pub barrio: String,
    /// Locality (district) containing the neighborhood.
    pub localidad: String,
    /// Representative x coordinate (longitude).
    pub coordx: f64,
    /// Representative y coordinate (latitude).
    pub coordsy: f64,
    /// Number of survey respondents in the neighborhood.
    pub total_encuestas: u64,
    /// Respondents satisfying every filter, never above `total_encuestas`.
    pub matches_count: u64,
    /// `matches_count / total_encuestas * 100`, within `[0, 100]`.
    pub match_percentage: f64,
    /// Value used for color interpolation within this batch.
    pub intensity_score: f64,
}

/// Questions of one category, in listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuestions {
    /// Category name.
    pub name: String,
    /// Questions belonging to the category.
    pub questions: Vec<Question>,
}

/// Category → question metadata, as loaded from a store or a catalog file.
///
/// Categories keep the order in which they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionCatalog {
    categories: Vec<CategoryQuestions>,
}

impl QuestionCatalog {
    /// Builds a catalog from a flat question list, grouping by category.
    ///
    /// A question id that appears twice keeps its first definition.
    #[must_use]
    pub fn from_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut catalog = Self::default();
        for question in questions {
            catalog.insert(question);
        }
        catalog
    }

    fn insert(&mut self, question: Question) {
        if self.question(&question.question_id).is_some() {
            return;
        }
        if let Some(group) = self
            .categories
            .iter_mut()
            .find(|group| group.name == question.category)
        {
            group.questions.push(question);
        } else {
            self.categories.push(CategoryQuestions {
                name: question.category.clone(),
                questions: vec![question],
            });
        }
    }

    /// Category names in listing order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|group| group.name.as_str())
    }

    /// Questions of a category, empty if the category is unknown.
    #[must_use]
    pub fn questions(&self, category: &str) -> &[Question] {
        self.categories
            .iter()
            .find(|group| group.name == category)
            .map_or(&[], |group| group.questions.as_slice())
    }

    /// Looks up a question by id across all categories.
    #[must_use]
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.categories
            .iter()
            .flat_map(|group| group.questions.iter())
            .find(|q| q.question_id == question_id)
    }

    /// Category a question belongs to.
    #[must_use]
    pub fn category_of(&self, question_id: &str) -> Option<&str> {
        self.question(question_id).map(|q| q.category.as_str())
    }

    /// Total number of questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.iter().map(|group| group.questions.len()).sum()
    }

    /// Whether the catalog holds no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable text for a filter, e.g. `"43. Afiliación a salud: Subsidiado"`.
    ///
    /// Falls back to the bare question id when the question is unknown.
    #[must_use]
    pub fn describe(&self, filter: &Filter) -> String {
        self.question(&filter.question_id).map_or_else(
            || format!("{}: {}", filter.question_id, filter.response),
            |q| format!("{}. {}: {}", q.question_id, q.text, filter.response),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(category: &str, id: &str) -> Question {
        Question {
            category: category.to_string(),
            question_id: id.to_string(),
            text: format!("Question {id}"),
            response_count: 0,
        }
    }

    #[test]
    fn catalog_groups_by_first_seen_category() {
        let catalog = QuestionCatalog::from_questions([
            question("Salud", "43"),
            question("Educación", "12"),
            question("Salud", "44"),
            question("Salud", "43"),
        ]);

        assert_eq!(
            catalog.categories().collect::<Vec<_>>(),
            vec!["Salud", "Educación"]
        );
        assert_eq!(catalog.questions("Salud").len(), 2);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.category_of("12"), Some("Educación"));
        assert!(catalog.questions("Vivienda").is_empty());
    }

    #[test]
    fn describe_uses_question_text_when_known() {
        let catalog = QuestionCatalog::from_questions([question("Salud", "43")]);
        let known = Filter {
            question_id: "43".to_string(),
            category: None,
            response: "Subsidiado / SISBÉN".to_string(),
        };
        let unknown = Filter {
            question_id: "99".to_string(),
            ..known.clone()
        };

        assert_eq!(
            catalog.describe(&known),
            "43. Question 43: Subsidiado / SISBÉN"
        );
        assert_eq!(catalog.describe(&unknown), "99: Subsidiado / SISBÉN");
    }

    #[test]
    fn query_mode_follows_filter_list() {
        assert_eq!(QueryMode::for_filters(&[]), QueryMode::General);
        let filter = Filter {
            question_id: "1".to_string(),
            category: None,
            response: "Sí".to_string(),
        };
        assert_eq!(QueryMode::for_filters(&[filter]), QueryMode::Filtered);
        assert_eq!(QueryMode::Filtered.to_string(), "filtered");
    }

    #[test]
    fn neighborhood_count_accepts_missing_matches() {
        let raw: NeighborhoodCount = serde_json::from_str(
            r#"{"barrio":"Riomar","localidad":"Riomar","coordx":-74.8,"coordsy":11.0,"total_encuestas":100}"#,
        )
        .unwrap();
        assert_eq!(raw.matches_count, None);
        assert_eq!(raw.total_encuestas, 100);
    }
}
