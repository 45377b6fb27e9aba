//! Chat completion providers used to phrase RAG answers.

use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::blocking::Response;

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicChat;
pub use ollama::{OllamaChat, DEFAULT_OLLAMA_URL};
pub use openai::OpenAiChat;

const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

/// One single-turn completion request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// System instruction.
    pub system: &'a str,
    /// User turn.
    pub prompt: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: usize,
}

/// A language model that answers one prompt.
pub trait ChatModel {
    /// Returns the assistant text for `request`.
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}

impl<C: ChatModel + ?Sized> ChatModel for Box<C> {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        (**self).complete(request)
    }
}

fn ensure_success(resp: Response, service: &str) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp
        .text()
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    bail!("{service} returned {status}: {text}");
}

fn non_empty(answer: String, service: &str) -> Result<String> {
    if answer.trim().is_empty() {
        bail!("{service} response missing text content");
    }
    Ok(answer)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// Records prompts and replies with a fixed answer.
    pub(crate) struct ScriptedChat {
        pub(crate) answer: String,
        pub(crate) prompts: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedChat {
        pub(crate) fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatModel for ScriptedChat {
        fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
            self.prompts
                .borrow_mut()
                .push((request.system.to_string(), request.prompt.to_string()));
            Ok(self.answer.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_answers_are_errors() {
        assert!(non_empty("  \n".into(), "Ollama").is_err());
        assert_eq!(non_empty("Dr. Doe".into(), "Ollama").unwrap(), "Dr. Doe");
    }
}
