//! Conversation-state and request-assembly engine for a local LLM chat client.
//!
//! The crate owns the chat threads, turns user input into chat-completion
//! requests, talks to the inference endpoint and cleans model output for
//! display. Rendering is left to the front end through [`services::MessageRenderer`].

pub mod controllers;
pub mod models;
pub mod services;
pub mod settings;

pub use controllers::{PendingTurn, SubmitRejected, TurnController, TurnOutcome, TurnState};
pub use models::{ChatThread, ConversationsStore, Message, MessageId, Role, StoreError, ThreadId};
pub use services::{ClientError, HttpInferenceClient, InferenceBackend};
