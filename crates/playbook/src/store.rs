//! In-memory playbook store with primary/fallback loading.
//!
//! Storage format: a JSON array of [`StrategyEntry`] objects. Entry order
//! in the file is the order retrieval walks them in.

use crate::entry::StrategyEntry;
use imali_core::error::PlaybookError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the loaded playbook came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybookSource {
    /// The primary (evolved) playbook file
    Primary(PathBuf),
    /// The seed playbook, used because the primary was absent
    Fallback(PathBuf),
    /// Built in memory
    Inline,
}

impl std::fmt::Display for PlaybookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybookSource::Primary(p) => write!(f, "{}", p.display()),
            PlaybookSource::Fallback(p) => write!(f, "{} (fallback)", p.display()),
            PlaybookSource::Inline => f.write_str("inline"),
        }
    }
}

/// An ordered, immutable collection of strategies.
///
/// There are no mutating methods: wrap it in an `Arc` and share it.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<StrategyEntry>,
    source: PlaybookSource,
}

impl KnowledgeBase {
    /// Build a knowledge base from entries already in memory.
    pub fn from_entries(entries: Vec<StrategyEntry>) -> Self {
        Self {
            entries,
            source: PlaybookSource::Inline,
        }
    }

    /// Load the primary playbook, or the fallback if the primary does not
    /// exist. Any other failure (unreadable file, bad JSON, blank fields,
    /// missing fallback) is returned as-is; nothing is merged or retried.
    pub fn load(primary: &Path, fallback: &Path) -> Result<Self, PlaybookError> {
        let kb = match read_entries(primary) {
            Ok(entries) => Self {
                entries,
                source: PlaybookSource::Primary(primary.to_path_buf()),
            },
            Err(PlaybookError::NotFound { .. }) => {
                warn!(
                    primary = %primary.display(),
                    fallback = %fallback.display(),
                    "Evolved playbook not found, loading seed"
                );
                Self {
                    entries: read_entries(fallback)?,
                    source: PlaybookSource::Fallback(fallback.to_path_buf()),
                }
            }
            Err(e) => return Err(e),
        };

        info!(strategies = kb.len(), source = %kb.source, "Playbook loaded");
        Ok(kb)
    }

    /// All strategies, in file order.
    pub fn all(&self) -> &[StrategyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> &PlaybookSource {
        &self.source
    }
}

/// Read and validate a single playbook file.
fn read_entries(path: &Path) -> Result<Vec<StrategyEntry>, PlaybookError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PlaybookError::NotFound {
            path: path.to_path_buf(),
        },
        _ => PlaybookError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    let entries: Vec<StrategyEntry> =
        serde_json::from_str(&content).map_err(|e| PlaybookError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    for (index, entry) in entries.iter().enumerate() {
        entry
            .validate()
            .map_err(|reason| PlaybookError::InvalidEntry {
                path: path.to_path_buf(),
                index,
                reason: reason.to_string(),
            })?;
    }

    debug!(path = %path.display(), count = entries.len(), "Playbook file parsed");
    Ok(entries)
}
