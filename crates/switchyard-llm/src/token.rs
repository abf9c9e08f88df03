//! Token counting
//!
//! Client-side token estimation using tiktoken's cl100k_base encoding. Used
//! for pre-flight cost estimates and by the stub provider to report
//! plausible usage. Real providers report their own counts.

use crate::generation::GenerationRequest;
use crate::message::Message;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Shared tokenizer; `None` if the encoding tables failed to load
static TOKENIZER: LazyLock<Option<CoreBPE>> = LazyLock::new(|| cl100k_base().ok());

/// Approximate characters per token when no tokenizer is available
const CHARS_PER_TOKEN: usize = 4;

/// Role marker plus separators
const MESSAGE_OVERHEAD: usize = 6;

/// Conversation start/end tokens
const CONVERSATION_OVERHEAD: usize = 3;

/// Token counter for estimating message token usage
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a new token counter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Count tokens in a string
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        match TOKENIZER.as_ref() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.chars().count().div_ceil(CHARS_PER_TOKEN),
        }
    }

    /// Count tokens in a message (includes role overhead)
    #[must_use]
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        self.count_tokens(&message.content) + MESSAGE_OVERHEAD
    }

    /// Count total tokens in a conversation
    #[must_use]
    pub fn count_conversation_tokens(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.count_message_tokens(m))
            .sum::<usize>()
            + CONVERSATION_OVERHEAD
    }

    /// Estimate prompt tokens for a whole request, system prompt included
    #[must_use]
    pub fn count_request_tokens(&self, request: &GenerationRequest) -> usize {
        let system = request
            .system_prompt
            .as_deref()
            .map(|s| self.count_tokens(s) + MESSAGE_OVERHEAD)
            .unwrap_or(0);
        system + self.count_conversation_tokens(&request.messages)
    }
}

/// Convenience function to count tokens in text
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TokenCounter::new().count_tokens(text)
}

/// Convenience function to count prompt tokens for a request
#[must_use]
pub fn count_request_tokens(request: &GenerationRequest) -> usize {
    TokenCounter::new().count_request_tokens(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_counter_basic() {
        let counter = TokenCounter::new();

        let tokens = counter.count_tokens("Hello, world!");
        assert!(tokens > 0);
        assert!(tokens < 10);

        assert_eq!(counter.count_tokens(""), 0);
    }

    #[test]
    fn test_token_counter_message() {
        let counter = TokenCounter::new();

        let message = Message::user("Hello, how are you?");
        let tokens = counter.count_message_tokens(&message);

        let content_tokens = counter.count_tokens("Hello, how are you?");
        assert_eq!(tokens, content_tokens + MESSAGE_OVERHEAD);
    }

    #[test]
    fn test_request_tokens_include_system_prompt() {
        let bare = GenerationRequest::new().with_message(Message::user("Hello!"));
        let with_system = bare.clone().with_system_prompt("You are terse.");

        assert!(count_request_tokens(&with_system) > count_request_tokens(&bare));
        assert!(count_request_tokens(&bare) > count_tokens("Hello!"));
    }
}
