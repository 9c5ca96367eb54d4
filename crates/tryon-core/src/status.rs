//! Status and mode enums for try-on Tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a try-on Task.
///
/// CREATED and PROCESSING are the in-flight states the reconciliation
/// loop polls; COMPLETED, FAILED, and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Submitted to the provider but not yet observed processing.
    #[default]
    Created,
    /// The provider reported the job as in progress.
    Processing,
    /// Provider success plus a materialized result asset.
    Completed,
    /// Provider failure, materialization failure, or poll limit.
    Failed,
    /// Cancelled by the user. Never set by the reconciliation loop.
    Cancelled,
}

impl TaskState {
    /// Returns true if no further automatic transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the task is still reconciled against the provider.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// Submission mode: how many garment images the task carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TryOnMode {
    /// Exactly one garment image.
    #[default]
    Single,
    /// Exactly two garment images: one upper, one lower.
    Combo,
}

impl TryOnMode {
    /// Number of garment images this mode requires.
    pub fn garment_count(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Combo => 2,
        }
    }

    /// Wire representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Combo => "combo",
        }
    }
}

impl fmt::Display for TryOnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Garment category sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarmentCategory {
    Upper,
    Lower,
    FullSet,
    Combo,
}

impl GarmentCategory {
    /// Wire representation of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::FullSet => "full_set",
            Self::Combo => "combo",
        }
    }
}

impl fmt::Display for GarmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Created.is_terminal());
        assert!(!TaskState::Processing.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn test_mode_garment_count() {
        assert_eq!(TryOnMode::Single.garment_count(), 1);
        assert_eq!(TryOnMode::Combo.garment_count(), 2);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(GarmentCategory::FullSet.as_str(), "full_set");
        assert_eq!(GarmentCategory::Upper.as_str(), "upper");
    }
}
