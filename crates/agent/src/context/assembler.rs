//! Prompt assembly. Turns retrieved strategies and the user's query into
//! the two-message conversation sent to the generation backend.

use crate::context::retriever::ContextSnippet;
use imali_core::message::Message;

const PERSONA: &str = "You are Imali-Bot, an expert financial assistant.";

const INSTRUCTIONS: &str = "\
INSTRUCTIONS:
- Analyze the user query using the strategies above.
- Be concise and professional.
- If the query is about fraud or anomalies, explain WHY based on the heuristics.";

/// Render the system instructions around the selected strategy lines.
pub fn system_prompt(snippets: &[ContextSnippet]) -> String {
    let strategies = snippets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{PERSONA}\n\nCURRENT PLAYBOOK STRATEGIES (Use these to answer):\n{strategies}\n\n{INSTRUCTIONS}"
    )
}

/// Build `[system, user]`. The query is passed through untouched.
pub fn assemble(query: &str, snippets: &[ContextSnippet]) -> Vec<Message> {
    vec![Message::system(system_prompt(snippets)), Message::user(query)]
}
