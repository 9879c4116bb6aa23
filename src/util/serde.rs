//! Serializable identifiers and priority levels shared across the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-chosen task identifier, unique among live tasks.
pub type TaskId = String;

/// Task priority. Ordering is `Low < Normal < High < Urgent`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work such as speculative prefetch.
    Low,
    /// Regular loads.
    #[default]
    Normal,
    /// Loads the user is waiting on.
    High,
    /// Loads blocking the current frame.
    Urgent,
}

impl Priority {
    /// All priorities from lowest to highest.
    pub const ALL: [Self; 4] = [Self::Low, Self::Normal, Self::High, Self::Urgent];

    /// Lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
