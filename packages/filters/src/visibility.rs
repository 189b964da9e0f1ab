//! UI state driven by filter events.
//!
//! Neither type here is consulted by the aggregation pipeline; they exist
//! so a front end can keep its panels consistent with the filter set by
//! applying [`FilterEvent`]s as they are broadcast.

use std::collections::BTreeSet;

use survey_map_survey_models::QuestionCatalog;

use crate::{FilterEvent, FilterSet};

/// Which question categories are expanded in the filter panel.
///
/// By default only categories with an active filter or an explicit
/// expansion are visible. The "show all" toggle overrides that until the
/// filter set is cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryVisibility {
    show_all: bool,
    expanded: BTreeSet<String>,
}

impl CategoryVisibility {
    /// Whether every category is shown.
    #[must_use]
    pub const fn show_all(&self) -> bool {
        self.show_all
    }

    /// Sets the "show all categories" toggle.
    pub const fn set_show_all(&mut self, show_all: bool) {
        self.show_all = show_all;
    }

    /// Marks a category as explicitly expanded.
    pub fn expand(&mut self, category: impl Into<String>) {
        self.expanded.insert(category.into());
    }

    /// Removes an explicit expansion.
    pub fn collapse(&mut self, category: &str) {
        self.expanded.remove(category);
    }

    /// Whether `category` should be rendered expanded.
    #[must_use]
    pub fn is_visible(&self, category: &str, filters: &FilterSet, catalog: &QuestionCatalog) -> bool {
        self.show_all
            || self.expanded.contains(category)
            || filters.active_categories(catalog).contains(category)
    }

    /// Visible categories in catalog order.
    #[must_use]
    pub fn visible_categories<'a>(
        &self,
        filters: &FilterSet,
        catalog: &'a QuestionCatalog,
    ) -> Vec<&'a str> {
        catalog
            .categories()
            .filter(|category| self.is_visible(category, filters, catalog))
            .collect()
    }

    /// Collapses back to the default: show-all off, explicit expansions kept.
    pub const fn reset(&mut self) {
        self.show_all = false;
    }

    /// Applies a filter event.
    pub fn apply(&mut self, event: &FilterEvent) {
        if matches!(event, FilterEvent::Cleared) {
            log::debug!("Filters cleared, resetting category visibility");
            self.reset();
        }
    }
}

/// The question currently open in the response picker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionSelection {
    selected: Option<String>,
}

impl QuestionSelection {
    /// Opens a question.
    pub fn select(&mut self, question_id: impl Into<String>) {
        self.selected = Some(question_id.into());
    }

    /// Closes the picker.
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Currently selected question.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Clears the selection if the event removed its question's filter.
    pub fn apply(&mut self, event: &FilterEvent) {
        if self
            .selected
            .as_deref()
            .is_some_and(|question_id| event.removes(question_id))
        {
            self.clear();
        }
    }
}
