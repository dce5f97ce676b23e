use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::time::SystemTime;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::models::{ErrorEntry, ErrorLevel, ThreadId};

/// Default number of entries buffered between drains
const CHANNEL_CAPACITY: usize = 1000;

/// Splits event fields into the typed parts of an [`ErrorEntry`].
///
/// `thread_id` and `status` are what the turn controller attaches to failed
/// turns; values that do not parse stay in `details`.
#[derive(Default)]
struct EntryFields {
    message: Option<String>,
    thread_id: Option<ThreadId>,
    status: Option<u16>,
    details: Vec<(&'static str, String)>,
}

impl EntryFields {
    fn record(&mut self, name: &'static str, value: String) {
        match name {
            "message" => self.message = Some(value),
            "thread_id" => match value.parse() {
                Ok(id) => self.thread_id = Some(id),
                Err(_) => self.details.push((name, value)),
            },
            "status" => match value.parse() {
                Ok(status) => self.status = Some(status),
                Err(_) => self.details.push((name, value)),
            },
            _ => self.details.push((name, value)),
        }
    }

    fn into_entry(self, level: ErrorLevel, target: &str) -> ErrorEntry {
        ErrorEntry {
            timestamp: SystemTime::now(),
            level,
            message: self.message.unwrap_or_default(),
            target: target.to_string(),
            thread_id: self.thread_id,
            status: self.status,
            details: self.details,
        }
    }
}

impl Visit for EntryFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field.name(), value.to_string());
    }

    // Numbers and `%`/`?` values all arrive here
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field.name(), format!("{value:?}"));
    }
}

/// Tracing layer that forwards WARN and ERROR events to the diagnostics log.
///
/// Never blocks the logging thread: entries are dropped while the channel is
/// full. Pair the receiver with [`ErrorStore::drain_from`](crate::models::ErrorStore::drain_from).
pub struct ErrorCollectorLayer {
    sender: SyncSender<ErrorEntry>,
}

impl ErrorCollectorLayer {
    pub fn new() -> (Self, Receiver<ErrorEntry>) {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<ErrorEntry>) {
        let (sender, receiver) = sync_channel(capacity);
        (Self { sender }, receiver)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCollectorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            Level::ERROR => ErrorLevel::Error,
            Level::WARN => ErrorLevel::Warning,
            _ => return,
        };

        let mut fields = EntryFields::default();
        event.record(&mut fields);

        let _ = self
            .sender
            .try_send(fields.into_entry(level, metadata.target()));
    }
}
