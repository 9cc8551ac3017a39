//! Error types for the Imali domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Imali operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge base errors ---
    #[error("Playbook error: {0}")]
    Playbook(#[from] PlaybookError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Failures while loading the strategy playbook. All of these are fatal
/// at startup; none can happen once the playbook is in memory.
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("Playbook file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read playbook at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse playbook at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid strategy #{index} in {path}: {reason}")]
    InvalidEntry {
        path: PathBuf,
        index: usize,
        reason: String,
    },
}
