// Moderation domain models.
//
// These are pure domain types with no storage or HTTP dependencies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of moderating one piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationVerdict {
    /// Text may be shown to everyone.
    Accepted,
    /// Rejected by the local word list; the classifier was not consulted.
    Profane,
    /// Rejected by the remote toxicity classifier.
    Harmful,
}

impl ModerationVerdict {
    pub fn is_accepted(self) -> bool {
        self == ModerationVerdict::Accepted
    }
}

impl std::fmt::Display for ModerationVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationVerdict::Accepted => write!(f, "Accepted"),
            ModerationVerdict::Profane => write!(f, "Profane"),
            ModerationVerdict::Harmful => write!(f, "Harmful"),
        }
    }
}

/// Configuration for the content moderator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Reject profane text without asking the classifier.
    pub profanity_forbidden: bool,
    /// Labels that mark a classifier response as harmful when they appear
    /// anywhere in the raw response.
    pub harm_category_labels: Vec<String>,
    /// Words added to the built-in profanity list.
    pub extra_profane_words: Vec<String>,
    /// Upper bound on one classifier call.
    pub request_timeout: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            profanity_forbidden: true,
            harm_category_labels: vec!["HIGH".to_string(), "MEDIUM".to_string()],
            extra_profane_words: Vec::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}
