//! The Imali request path.
//!
//! A query flows through four steps:
//!
//! 1. **Retrieve** up to three playbook strategies by keyword
//! 2. **Assemble** them into the Imali-Bot system prompt plus the query
//! 3. **Generate** through the configured backend
//! 4. **Extract** the answer from the (usually prompt-echoing) output
//!
//! [`PredictPipeline`] ties the steps together and is what the gateway
//! and CLI hold.

pub mod context;
pub mod extract;
pub mod pipeline;

pub use context::{ContextSnippet, MAX_SNIPPETS, assemble, retrieve};
pub use extract::extract_answer;
pub use pipeline::{PredictPipeline, PredictResponse, QueryRequest};

#[cfg(test)]
pub(crate) mod test_helpers;
