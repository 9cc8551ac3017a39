//! Chat templates — flattening a conversation into a single prompt string.
//!
//! Every template ends with the assistant header so the model continues
//! as the assistant (the `add_generation_prompt` behaviour of HF tokenizers).

use crate::message::{Message, Role};
use serde::{Deserialize, Serialize};

/// Chat template format used to structure messages for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTemplate {
    /// `<|im_start|>system\n{content}<|im_end|>\n...<|im_start|>assistant\n`
    /// (Qwen2 / Qwen2.5 instruct models)
    #[default]
    ChatML,
    /// `<|system|>\n{content}</s>\n<|user|>\n{content}</s>\n<|assistant|>\n`
    TinyLlama,
    /// `[INST] <<SYS>>\n{system}\n<</SYS>>\n\n{content} [/INST]`
    Llama2,
    /// `<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{content}<|eot_id|>`
    Llama3,
}

impl ChatTemplate {
    /// Render the conversation into the backend's linear prompt.
    pub fn render(&self, messages: &[Message]) -> String {
        match self {
            ChatTemplate::ChatML => format_chatml(messages),
            ChatTemplate::TinyLlama => format_tinyllama(messages),
            ChatTemplate::Llama2 => format_llama2(messages),
            ChatTemplate::Llama3 => format_llama3(messages),
        }
    }
}

impl std::str::FromStr for ChatTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chatml" | "qwen" => Ok(ChatTemplate::ChatML),
            "tinyllama" | "zephyr" => Ok(ChatTemplate::TinyLlama),
            "llama2" => Ok(ChatTemplate::Llama2),
            "llama3" => Ok(ChatTemplate::Llama3),
            other => Err(format!(
                "unknown chat template '{other}' (expected chatml, tinyllama, llama2 or llama3)"
            )),
        }
    }
}

fn format_chatml(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str("<|im_start|>");
        prompt.push_str(msg.role.as_str());
        prompt.push('\n');
        prompt.push_str(&msg.content);
        prompt.push_str("<|im_end|>\n");
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

fn format_tinyllama(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str("<|");
        prompt.push_str(msg.role.as_str());
        prompt.push_str("|>\n");
        prompt.push_str(&msg.content);
        prompt.push_str("</s>\n");
    }
    prompt.push_str("<|assistant|>\n");
    prompt
}

fn format_llama2(messages: &[Message]) -> String {
    let mut prompt = String::new();
    let mut system_prompt = String::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                system_prompt = msg.content.clone();
            }
            Role::User => {
                prompt.push_str("[INST] ");
                if !system_prompt.is_empty() {
                    prompt.push_str("<<SYS>>\n");
                    prompt.push_str(&system_prompt);
                    prompt.push_str("\n<</SYS>>\n\n");
                    system_prompt.clear();
                }
                prompt.push_str(&msg.content);
                prompt.push_str(" [/INST]");
            }
            Role::Assistant => {
                prompt.push(' ');
                prompt.push_str(&msg.content);
                prompt.push_str(" </s>");
            }
        }
    }
    prompt
}

fn format_llama3(messages: &[Message]) -> String {
    let mut prompt = String::from("<|begin_of_text|>");
    for msg in messages {
        prompt.push_str("<|start_header_id|>");
        prompt.push_str(msg.role.as_str());
        prompt.push_str("<|end_header_id|>\n\n");
        prompt.push_str(&msg.content);
        prompt.push_str("<|eot_id|>");
    }
    prompt.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    prompt
}
