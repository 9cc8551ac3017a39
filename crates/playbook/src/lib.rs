//! Strategy playbook — the knowledge base behind retrieval.
//!
//! The playbook is a JSON array of strategy entries, loaded once at startup
//! from a primary (evolved) file, or from a seed file when the primary does
//! not exist. It is never modified afterwards and is shared read-only
//! across all requests.

pub mod entry;
pub mod store;

pub use entry::StrategyEntry;
pub use store::{KnowledgeBase, PlaybookSource};
