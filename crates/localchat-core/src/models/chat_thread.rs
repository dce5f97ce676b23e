use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use uuid::Uuid;

use super::message::Message;

pub const DEFAULT_THREAD_TITLE: &str = "New Chat";

/// Identifier of a chat thread
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(Uuid);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parses the hyphenated form written by `Display`
impl FromStr for ThreadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A single conversation between the user and the assistant.
///
/// Only [`ConversationsStore`](super::ConversationsStore) mutates a thread; outside
/// the store it is read-only.
#[derive(Clone, Debug)]
pub struct ChatThread {
    id: ThreadId,
    title: String,
    messages: Vec<Message>,
    documents: Vec<String>,
    created_at: SystemTime,
}

impl ChatThread {
    pub(crate) fn new() -> Self {
        Self {
            id: ThreadId::new(),
            title: DEFAULT_THREAD_TITLE.to_string(),
            messages: Vec::new(),
            documents: Vec::new(),
            created_at: SystemTime::now(),
        }
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn push_documents(&mut self, names: &[String]) {
        self.documents.extend_from_slice(names);
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Messages in append order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Names of attached documents (metadata only)
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
