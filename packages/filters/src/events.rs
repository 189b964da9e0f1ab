//! Filter change notifications.
//!
//! The owner of a [`crate::FilterSet`] broadcasts one [`FilterEvent`] per
//! mutation. UI-state owners (selected question, category visibility)
//! subscribe and update themselves instead of the aggregation engine
//! reaching into their state.

/// What changed in a filter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    /// A filter was added for a question that had none.
    Added {
        /// Question now filtered.
        question_id: String,
    },
    /// A question's filter was swapped for a new response.
    Replaced {
        /// Question whose filter changed.
        question_id: String,
    },
    /// A question's filter was removed.
    Removed {
        /// Question no longer filtered.
        question_id: String,
    },
    /// Every filter was removed.
    Cleared,
}

impl FilterEvent {
    /// Question affected by the event, `None` for [`Self::Cleared`].
    #[must_use]
    pub fn question_id(&self) -> Option<&str> {
        match self {
            Self::Added { question_id }
            | Self::Replaced { question_id }
            | Self::Removed { question_id } => Some(question_id),
            Self::Cleared => None,
        }
    }

    /// Whether the event removed the filter on `question_id`.
    #[must_use]
    pub fn removes(&self, question_id: &str) -> bool {
        match self {
            Self::Removed { question_id: removed } => removed == question_id,
            Self::Cleared => true,
            Self::Added { .. } | Self::Replaced { .. } => false,
        }
    }
}
