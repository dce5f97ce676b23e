use thiserror::Error;
use tracing::debug;

use super::chat_thread::{ChatThread, ThreadId};
use super::message::Message;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("thread not found: {0}")]
    NotFound(ThreadId),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Session-wide store for all chat threads.
///
/// Holds at least one thread at all times and exactly one active thread.
/// Threads are kept in creation order, which is also the order used when the
/// active thread has to be replaced.
pub struct ConversationsStore {
    threads: Vec<ChatThread>,
    active_thread_id: ThreadId,
}

impl ConversationsStore {
    /// Create a store holding a single empty, active thread
    pub fn new() -> Self {
        let thread = ChatThread::new();
        let active_thread_id = thread.id();
        Self {
            threads: vec![thread],
            active_thread_id,
        }
    }

    /// Insert a new empty thread and make it active
    pub fn create_thread(&mut self) -> ThreadId {
        let thread = ChatThread::new();
        let id = thread.id();
        self.threads.push(thread);
        self.active_thread_id = id;
        debug!(thread_id = %id, count = self.threads.len(), "Created thread");
        id
    }

    /// Delete a thread.
    ///
    /// Deleting the last thread creates its replacement first. If the deleted
    /// thread was active, the first remaining thread becomes active.
    pub fn delete_thread(&mut self, id: ThreadId) -> StoreResult<()> {
        let index = self.index_of(id)?;

        if self.threads.len() == 1 {
            self.create_thread();
        }

        self.threads.remove(index);

        if self.active_thread_id == id {
            // Never empty here: a replacement was pushed above when needed
            self.active_thread_id = self.threads[0].id();
        }

        debug!(thread_id = %id, active = %self.active_thread_id, "Deleted thread");
        Ok(())
    }

    /// Make an existing thread the active one
    pub fn select_thread(&mut self, id: ThreadId) -> StoreResult<()> {
        self.index_of(id)?;
        self.active_thread_id = id;
        Ok(())
    }

    /// Append a message to the end of a thread's log
    pub fn append_message(&mut self, thread_id: ThreadId, message: Message) -> StoreResult<()> {
        self.thread_mut(thread_id)?.push_message(message);
        Ok(())
    }

    /// Record attached document names and post a summary message to the thread
    pub fn attach_documents(&mut self, thread_id: ThreadId, names: &[String]) -> StoreResult<()> {
        let thread = self.thread_mut(thread_id)?;
        if names.is_empty() {
            return Ok(());
        }

        thread.push_documents(names);
        thread.push_message(Message::assistant(format!(
            "Uploaded documents: {}",
            names.join(", ")
        )));
        Ok(())
    }

    pub fn rename_thread(&mut self, id: ThreadId, title: impl Into<String>) -> StoreResult<()> {
        self.thread_mut(id)?.set_title(title.into());
        Ok(())
    }

    pub fn active_id(&self) -> ThreadId {
        self.active_thread_id
    }

    pub fn active_thread(&self) -> &ChatThread {
        // The active id always references a stored thread
        self.threads
            .iter()
            .find(|t| t.id() == self.active_thread_id)
            .unwrap_or(&self.threads[0])
    }

    pub fn thread(&self, id: ThreadId) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.id() == id)
    }

    /// All threads in creation order
    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }

    pub fn count(&self) -> usize {
        self.threads.len()
    }

    fn index_of(&self, id: ThreadId) -> StoreResult<usize> {
        self.threads
            .iter()
            .position(|t| t.id() == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn thread_mut(&mut self, id: ThreadId) -> StoreResult<&mut ChatThread> {
        self.threads
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or(StoreError::NotFound(id))
    }
}

impl Default for ConversationsStore {
    fn default() -> Self {
        Self::new()
    }
}
