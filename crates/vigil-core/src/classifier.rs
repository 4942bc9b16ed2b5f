//! Intent classification boundary.
//!
//! The engine never interprets free text itself. An external classifier
//! turns raw input into an [`Intent`]; the session state machine only
//! looks at the type tag, the confidence score, and the extracted
//! entities.

use crate::error::Result;
use crate::session::ConversationContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The classified meaning of a user's free-text input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Type tag, e.g. `"threat_scan"`, `"status_check"`.
    pub intent_type: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Entities extracted from the text (targets, hostnames, CIDRs, ...).
    #[serde(default)]
    pub entities: HashMap<String, serde_json::Value>,
}

impl Intent {
    /// Creates an intent with no extracted entities.
    pub fn new(intent_type: impl Into<String>, confidence: f64) -> Self {
        Self {
            intent_type: intent_type.into(),
            confidence,
            entities: HashMap::new(),
        }
    }

    /// Whether the classifier is confident enough for direct handling.
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// An abstract natural-language intent classifier.
///
/// Implementations live outside this workspace (the demo CLI ships a
/// keyword-based stand-in). The context is passed so a classifier can
/// resolve follow-ups against accumulated entities.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classifies one unit of user input.
    ///
    /// # Errors
    ///
    /// Returns an error only for internal classifier faults; an
    /// ambiguous input is a low-confidence `Intent`, not an error.
    async fn classify(&self, text: &str, context: &ConversationContext) -> Result<Intent>;
}
