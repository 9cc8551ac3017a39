//! Request context: which playbook strategies apply, and how they are
//! framed for the model.

pub mod assembler;
pub mod retriever;

pub use assembler::{assemble, system_prompt};
pub use retriever::{ContextSnippet, MAX_SNIPPETS, retrieve};
