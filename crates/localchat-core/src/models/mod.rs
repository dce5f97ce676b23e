pub mod chat_thread;
pub mod conversations_store;
pub mod error_store;
pub mod message;

pub use chat_thread::{ChatThread, DEFAULT_THREAD_TITLE, ThreadId};
pub use conversations_store::{ConversationsStore, StoreError};
pub use error_store::{ErrorEntry, ErrorLevel, ErrorStore, ThreadErrors};
pub use message::{Message, MessageId, Role};
