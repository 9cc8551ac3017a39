//! Keyword retrieval over the playbook.
//!
//! An entry is relevant when its topic, or one of the first few words of
//! its content, appears anywhere in the lower-cased query. Matching is plain
//! substring containment: "Tax" matches "taxi". Results keep playbook order
//! and are cut at [`MAX_SNIPPETS`]; there is no ranking.

use imali_playbook::{KnowledgeBase, StrategyEntry};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on snippets handed to the prompt.
pub const MAX_SNIPPETS: usize = 3;

/// Number of leading content words used as keywords.
const CONTENT_KEYWORDS: usize = 5;

const FALLBACK_TOPIC: &str = "General Financial";
const FALLBACK_HEURISTIC: &str =
    "Ensure all transactions comply with local tax (SARS) and IFRS standards.";

/// One strategy selected for a request, rendered as `- [topic]: heuristic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub topic: String,
    pub heuristic: String,
}

impl ContextSnippet {
    pub fn new(topic: impl Into<String>, heuristic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            heuristic: heuristic.into(),
        }
    }

    /// The snippet used when nothing in the playbook matches.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_TOPIC, FALLBACK_HEURISTIC)
    }

    /// The rendered line up to (not including) its first `:`.
    ///
    /// For `- [Fraud]: Flag it` this is `- [Fraud]`. A topic that itself
    /// contains a colon yields a shorter label.
    pub fn label(&self) -> String {
        let line = self.to_string();
        match line.split_once(':') {
            Some((head, _)) => head.to_string(),
            None => line,
        }
    }
}

impl std::fmt::Display for ContextSnippet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "- [{}]: {}", self.topic, self.heuristic)
    }
}

impl From<&StrategyEntry> for ContextSnippet {
    fn from(entry: &StrategyEntry) -> Self {
        Self::new(&entry.topic, &entry.heuristic)
    }
}

/// Select at most [`MAX_SNIPPETS`] strategies for `query`.
///
/// Never empty: with no match the single fallback snippet is returned.
pub fn retrieve(query: &str, base: &KnowledgeBase) -> Vec<ContextSnippet> {
    let query = query.to_lowercase();

    let matches: Vec<ContextSnippet> = base
        .all()
        .iter()
        .filter(|entry| matches_entry(&query, entry))
        .map(ContextSnippet::from)
        .collect();

    debug!(
        matched = matches.len(),
        playbook = base.len(),
        "Playbook retrieval"
    );

    if matches.is_empty() {
        return vec![ContextSnippet::fallback()];
    }

    matches.into_iter().take(MAX_SNIPPETS).collect()
}

/// `query` must already be lower-cased. Content keywords are compared as
/// written, so a capitalised keyword never matches.
fn matches_entry(query: &str, entry: &StrategyEntry) -> bool {
    if query.contains(&entry.topic.to_lowercase()) {
        return true;
    }
    entry
        .content
        .split_whitespace()
        .take(CONTENT_KEYWORDS)
        .any(|word| query.contains(word))
}
