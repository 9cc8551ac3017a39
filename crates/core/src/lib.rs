//! # Imali Core
//!
//! Domain types, traits, and error definitions for the Imali playbook
//! RAG server. This crate has **zero framework dependencies**; it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The text-generation backend is defined as a trait here. Implementations
//! live in `imali-providers`. This enables:
//! - Swapping backends via configuration
//! - Testing the retrieval/assembly/extraction path with stub generators
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use error::{Error, PlaybookError, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{GenerationParams, Provider, ProviderRequest, ProviderResponse, Usage};
pub use template::ChatTemplate;
