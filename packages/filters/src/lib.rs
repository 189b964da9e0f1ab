#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter set composition and validation.
//!
//! A [`FilterSet`] is an immutable snapshot: every mutation returns a new
//! set, so consumers can compare the previous and next snapshot
//! structurally and only re-query when the effective filter list changed.
//! At most one filter per question is ever held; adding a filter for a
//! question that is already filtered replaces the earlier one.

pub mod events;
pub mod visibility;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use survey_map_survey_models::{Filter, QueryMode, QuestionCatalog};
use thiserror::Error;

pub use events::FilterEvent;
pub use visibility::{CategoryVisibility, QuestionSelection};

/// Errors raised while composing filters. These never reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Empty or malformed question id or response.
    #[error("Invalid filter value for question '{question_id}': {reason}")]
    InvalidFilterValue {
        /// Question the filter was meant for.
        question_id: String,
        /// What was wrong with the input.
        reason: String,
    },

    /// The question is not part of the catalog.
    #[error("Unknown question: {question_id}")]
    UnknownQuestion {
        /// Question id that failed to resolve.
        question_id: String,
    },
}

/// Selects a filter to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey<'a> {
    /// Position in insertion order.
    Index(usize),
    /// Question the filter constrains.
    Question(&'a str),
}

/// Ordered conjunction of filters, at most one per question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    /// Creates an empty filter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Returns a set with `question_id = response` added.
    ///
    /// Any filter already present for the same question is removed first,
    /// so the new filter lands at the end of the insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidFilterValue`] if the question id or the
    /// response is empty or blank.
    pub fn add_filter(
        &self,
        question_id: impl Into<String>,
        response: impl Into<String>,
        category: Option<String>,
    ) -> Result<Self, FilterError> {
        let question_id = question_id.into();
        let response = response.into();

        if question_id.trim().is_empty() {
            return Err(FilterError::InvalidFilterValue {
                question_id,
                reason: "question id is empty".to_string(),
            });
        }
        if response.trim().is_empty() {
            return Err(FilterError::InvalidFilterValue {
                question_id,
                reason: "response is empty".to_string(),
            });
        }

        let mut filters: Vec<Filter> = self
            .filters
            .iter()
            .filter(|f| f.question_id != question_id)
            .cloned()
            .collect();
        filters.push(Filter {
            question_id,
            category: category.filter(|c| !c.trim().is_empty()),
            response,
        });

        Ok(Self { filters })
    }

    /// Like [`Self::add_filter`], but resolves the question against a
    /// catalog and records its category.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownQuestion`] if the catalog does not know
    /// the question, or [`FilterError::InvalidFilterValue`] for blank input.
    pub fn add_validated(
        &self,
        catalog: &QuestionCatalog,
        question_id: &str,
        response: impl Into<String>,
    ) -> Result<Self, FilterError> {
        let question_id = question_id.trim();
        let Some(question) = catalog.question(question_id) else {
            return Err(FilterError::UnknownQuestion {
                question_id: question_id.to_string(),
            });
        };
        self.add_filter(question_id, response, Some(question.category.clone()))
    }

    /// Returns a set without the selected filter, plus the filter removed.
    ///
    /// An out-of-range index or unfiltered question leaves the set unchanged.
    #[must_use]
    pub fn remove_filter(&self, key: FilterKey<'_>) -> (Self, Option<Filter>) {
        let position = match key {
            FilterKey::Index(index) => (index < self.filters.len()).then_some(index),
            FilterKey::Question(question_id) => self
                .filters
                .iter()
                .position(|f| f.question_id == question_id),
        };

        let Some(position) = position else {
            return (self.clone(), None);
        };

        let mut filters = self.filters.clone();
        let removed = filters.remove(position);
        (Self { filters }, Some(removed))
    }

    /// Returns an empty set.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    /// Filters in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Filter] {
        &self.filters
    }

    /// Iterates filters in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    /// Filter on the given question, if any.
    #[must_use]
    pub fn get(&self, question_id: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.question_id == question_id)
    }

    /// Number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Query mode implied by this set.
    #[must_use]
    pub fn mode(&self) -> QueryMode {
        QueryMode::for_filters(&self.filters)
    }

    /// Categories that have at least one active filter.
    ///
    /// Filters without a recorded category are resolved via the catalog.
    #[must_use]
    pub fn active_categories<'a>(&'a self, catalog: &'a QuestionCatalog) -> BTreeSet<&'a str> {
        self.filters
            .iter()
            .filter_map(|f| {
                f.category
                    .as_deref()
                    .or_else(|| catalog.category_of(&f.question_id))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
