//! Answer extraction from generator output.
//!
//! Text-generation backends usually echo the prompt before the
//! continuation. The answer is whatever follows the prompt.

use tracing::debug;

/// Pull the model's answer out of `generated`.
///
/// 1. Text after the first verbatim occurrence of `prompt`.
/// 2. Otherwise, if `generated` starts with `prompt` modulo whitespace
///    (detokenizers often re-space special tokens), the text after that
///    prefix.
/// 3. Otherwise the backend did not echo; all of `generated` is the answer.
///
/// The result is always trimmed.
pub fn extract_answer(prompt: &str, generated: &str) -> String {
    if let Some((_, after)) = generated.split_once(prompt) {
        return after.trim().to_string();
    }

    if let Some(rest) = strip_prefix_ignoring_whitespace(generated, prompt) {
        debug!("Prompt echo matched ignoring whitespace");
        return rest.trim().to_string();
    }

    debug!("Prompt not echoed, using whole generation");
    generated.trim().to_string()
}

/// Walk both strings skipping whitespace; if every non-whitespace char of
/// `prefix` is matched in order at the start of `text`, return the rest.
fn strip_prefix_ignoring_whitespace<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut wanted = prefix.chars().filter(|c| !c.is_whitespace()).peekable();
    wanted.peek()?;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            continue;
        }
        match wanted.next() {
            Some(w) if w == ch => {
                if wanted.peek().is_none() {
                    return Some(&text[idx + ch.len_utf8()..]);
                }
            }
            _ => return None,
        }
    }
    None
}
