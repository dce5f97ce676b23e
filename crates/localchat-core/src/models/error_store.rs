use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::SystemTime;

use super::chat_thread::ThreadId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorLevel {
    Warning,
    Error,
}

/// A WARN or ERROR event captured for the diagnostics log
#[derive(Clone, Debug)]
pub struct ErrorEntry {
    pub timestamp: SystemTime,
    pub level: ErrorLevel,
    pub message: String,
    pub target: String,
    /// Thread the event was logged for (`thread_id` field)
    pub thread_id: Option<ThreadId>,
    /// HTTP status reported by the endpoint (`status` field)
    pub status: Option<u16>,
    /// Any other fields, in logging order
    pub details: Vec<(&'static str, String)>,
}

/// Entries logged for one thread, or for no thread at all
#[derive(Clone, Debug)]
pub struct ThreadErrors {
    pub thread_id: Option<ThreadId>,
    pub entries: Vec<ErrorEntry>,
}

/// Bounded diagnostics log, oldest entries evicted first.
///
/// Cloning shares the underlying log.
#[derive(Clone)]
pub struct ErrorStore {
    entries: Arc<Mutex<VecDeque<ErrorEntry>>>,
    max_entries: usize,
}

impl ErrorStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
        }
    }

    pub fn add_entry(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);

        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// Move everything currently queued by the collector layer into the log
    pub fn drain_from(&self, receiver: &Receiver<ErrorEntry>) -> usize {
        let mut drained = 0;
        while let Ok(entry) = receiver.try_recv() {
            self.add_entry(entry);
            drained += 1;
        }
        drained
    }

    pub fn get_all_entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Entries grouped by thread, groups ordered by their first entry
    pub fn grouped_by_thread(&self) -> Vec<ThreadErrors> {
        let mut groups: Vec<ThreadErrors> = Vec::new();
        for entry in self.entries.lock().iter() {
            match groups.iter_mut().find(|g| g.thread_id == entry.thread_id) {
                Some(group) => group.entries.push(entry.clone()),
                None => groups.push(ThreadErrors {
                    thread_id: entry.thread_id,
                    entries: vec![entry.clone()],
                }),
            }
        }
        groups
    }

    /// Number of ERROR entries recorded against `thread_id`
    pub fn failures_for(&self, thread_id: ThreadId) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == ErrorLevel::Error && e.thread_id == Some(thread_id))
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count_level(ErrorLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count_level(ErrorLevel::Warning)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn count_level(&self, level: ErrorLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }
}
