use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Message, Role};

/// Model served by the local inference endpoint
pub const MODEL_ID: &str = "deepseek-r1-distill-qwen-7b";
pub const TEMPERATURE: f64 = 0.7;
/// `-1` asks the endpoint for an unbounded completion
pub const UNLIMITED_TOKENS: i32 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("user input is empty")]
    EmptyInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestRole {
    System,
    User,
    Assistant,
}

impl From<Role> for RequestRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => RequestRole::User,
            Role::Assistant => RequestRole::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: RequestRole,
    pub content: String,
}

impl RequestMessage {
    fn new(role: RequestRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of a non-streaming chat-completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub temperature: f64,
    pub max_tokens: i32,
    pub stream: bool,
}

/// Build the request for a new user turn.
///
/// # Arguments
/// * `prior_messages` - The thread's log *before* the new user message was appended
/// * `new_user_text` - The raw input; trimmed before use
///
/// The transcript is rebuilt from these parameters alone. Passing the log after
/// the optimistic append would send the new message twice.
///
/// # Errors
/// Returns [`BuildError::EmptyInput`] if `new_user_text` is blank.
pub fn build(prior_messages: &[Message], new_user_text: &str) -> Result<ChatRequest, BuildError> {
    let text = new_user_text.trim();
    if text.is_empty() {
        return Err(BuildError::EmptyInput);
    }

    let mut messages = Vec::with_capacity(prior_messages.len() + 2);
    // TODO: make the system prompt configurable once settings expose one
    messages.push(RequestMessage::new(RequestRole::System, ""));
    messages.extend(
        prior_messages
            .iter()
            .map(|m| RequestMessage::new(m.role().into(), m.content())),
    );
    messages.push(RequestMessage::new(RequestRole::User, text));

    Ok(ChatRequest {
        model: MODEL_ID.to_string(),
        messages,
        temperature: TEMPERATURE,
        max_tokens: UNLIMITED_TOKENS,
        stream: false,
    })
}
