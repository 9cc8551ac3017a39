//! Text-generation backends for Imali.
//!
//! All providers implement the `imali_core::Provider` trait.
//! The router builds the configured backend at startup.

#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod router;

#[cfg(feature = "local")]
pub use local::LocalProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
