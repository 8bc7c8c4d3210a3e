//! Completion client abstraction
//!
//! Every generative step in the pipeline goes through [`CompletionClient`]:
//! a system instruction plus a user message in, a single text blob out.
//! No streaming, no tool calling.

mod error;
mod openai;

pub use error::LlmError;
pub use openai::OpenAiClient;

use anyhow::Result;
use async_trait::async_trait;

/// Role tag for a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a prompt
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait for completion providers
///
/// Treated as a black box with unbounded latency; malformed output is the
/// caller's problem to degrade gracefully (see the research and audience
/// stages for the parse discipline).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Send an ordered list of role-tagged messages, get back one text blob
    async fn chat(&self, messages: &[Message]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_tag_roles() {
        let sys = Message::system("be brief");
        let user = Message::user("Topic: rust");
        assert_eq!(sys.role, Role::System);
        assert_eq!(user.role, Role::User);
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
