//! A single playbook strategy.

use serde::{Deserialize, Serialize};

/// One topic/content/heuristic record advising on a financial scenario.
///
/// Unknown fields in the source JSON are ignored so evolved playbooks can
/// carry extra bookkeeping without breaking the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyEntry {
    /// Short category label, e.g. "Fraud"
    pub topic: String,

    /// Free-text description; only its leading words are used for matching
    pub content: String,

    /// Advice surfaced to the generation step
    pub heuristic: String,
}

impl StrategyEntry {
    pub fn new(
        topic: impl Into<String>,
        content: impl Into<String>,
        heuristic: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
            heuristic: heuristic.into(),
        }
    }

    /// Check that every field carries text. Returns the offending field name.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.topic.trim().is_empty() {
            return Err("empty topic");
        }
        if self.content.trim().is_empty() {
            return Err("empty content");
        }
        if self.heuristic.trim().is_empty() {
            return Err("empty heuristic");
        }
        Ok(())
    }
}
