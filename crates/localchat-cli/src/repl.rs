use std::ops::ControlFlow;
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result};
use localchat_core::models::{ErrorEntry, ErrorLevel, ErrorStore, ThreadErrors};
use localchat_core::{
    ClientError, HttpInferenceClient, InferenceBackend, PendingTurn, SubmitRejected, ThreadId,
    TurnController, TurnOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::commands::{HELP_TEXT, ReplCommand};
use crate::terminal_renderer::{format_message, format_timestamp};

/// What the request task reports back; `Err` when it panicked
type TurnResult = Result<Result<String, ClientError>, JoinError>;

/// Line-oriented chat loop over stdin.
///
/// Requests run on a spawned task so thread commands keep working while the
/// model is busy.
pub struct Repl {
    controller: TurnController,
    in_flight: Option<PendingTurn>,
    client: HttpInferenceClient,
    errors: ErrorStore,
    error_rx: Receiver<ErrorEntry>,
}

impl Repl {
    pub fn new(client: HttpInferenceClient, errors: ErrorStore, error_rx: Receiver<ErrorEntry>) -> Self {
        Self {
            controller: TurnController::default(),
            in_flight: None,
            client,
            errors,
            error_rx,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<TurnResult>();

        println!("localchat: talking to {}", self.client.endpoint());
        println!("Type /help for commands.\n");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read from stdin")? else {
                        break;
                    };
                    if self.handle_line(&line, &reply_tx).is_break() {
                        return Ok(());
                    }
                }
                Some(result) = reply_rx.recv() => {
                    self.finish_turn(result);
                }
            }
        }

        // Input closed; let a pending reply land before exiting
        if self.in_flight.is_some() {
            if let Some(result) = reply_rx.recv().await {
                self.finish_turn(result);
            }
        }

        Ok(())
    }

    fn handle_line(&mut self, line: &str, replies: &UnboundedSender<TurnResult>) -> ControlFlow<()> {
        match ReplCommand::parse(line) {
            ReplCommand::Submit(text) => self.submit(text, replies),
            ReplCommand::New => {
                self.controller.store_mut().create_thread();
                println!("Started a new thread.");
            }
            ReplCommand::List => self.print_threads(),
            ReplCommand::Switch(n) => match self.thread_at(n) {
                Some(id) => {
                    if let Err(e) = self.controller.store_mut().select_thread(id) {
                        warn!(error = %e, "Failed to switch thread");
                    }
                    self.print_transcript();
                }
                None => println!("No thread {n}, see /list."),
            },
            ReplCommand::Delete(n) => match self.thread_at(n) {
                Some(id) => {
                    if let Err(e) = self.controller.store_mut().delete_thread(id) {
                        warn!(error = %e, "Failed to delete thread");
                    }
                    println!(
                        "Deleted thread {n}. Active: \"{}\"",
                        self.controller.store().active_thread().title()
                    );
                }
                None => println!("No thread {n}, see /list."),
            },
            ReplCommand::Rename(title) => {
                let store = self.controller.store_mut();
                let id = store.active_id();
                if let Err(e) = store.rename_thread(id, title) {
                    warn!(error = %e, "Failed to rename thread");
                }
            }
            ReplCommand::Attach(names) => {
                let store = self.controller.store_mut();
                let id = store.active_id();
                match store.attach_documents(id, &names) {
                    Ok(()) => {
                        if let Some(summary) = store.active_thread().messages().last() {
                            print!("{}", format_message(summary));
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to attach documents"),
                }
            }
            ReplCommand::Errors => self.print_errors(),
            ReplCommand::Help => println!("{HELP_TEXT}"),
            ReplCommand::Quit => return ControlFlow::Break(()),
            ReplCommand::Invalid(usage) => println!("{usage}"),
        }

        ControlFlow::Continue(())
    }

    fn submit(&mut self, text: String, replies: &UnboundedSender<TurnResult>) {
        self.controller.set_input(text);

        match self.controller.begin_turn() {
            Ok(pending) => {
                let client = self.client.clone();
                let request = pending.request().clone();
                let replies = replies.clone();
                self.in_flight = Some(pending);

                tokio::spawn(async move {
                    let joined = tokio::spawn(async move { client.complete(&request).await }).await;
                    // The receiver is gone only when the REPL has exited
                    let _ = replies.send(joined);
                });
                println!("(waiting for the model...)");
            }
            Err(SubmitRejected::EmptyInput) => {}
            Err(SubmitRejected::TurnInFlight) => {
                println!("Still waiting for the previous reply, try again once it arrives.");
            }
        }
    }

    fn finish_turn(&mut self, result: TurnResult) {
        let Some(pending) = self.in_flight.take() else {
            warn!("Reply arrived with no turn in flight, ignoring it");
            return;
        };

        let outcome = match result {
            Ok(result) => self.controller.complete_turn(pending, result),
            Err(e) => {
                warn!(error = %e, thread_id = %pending.thread_id(), "Request task failed");
                self.controller.abandon_turn(pending)
            }
        };
        let drained = self.errors.drain_from(&self.error_rx);
        debug!(?outcome, drained, "Reply handled");

        match outcome {
            TurnOutcome::Replied {
                thread_id,
                message_id,
            }
            | TurnOutcome::Failed {
                thread_id,
                message_id,
            } => {
                let store = self.controller.store();
                let Some(thread) = store.thread(thread_id) else {
                    return;
                };

                if thread_id != store.active_id() {
                    println!("Reply arrived in \"{}\".", thread.title());
                } else if let Some(message) = thread.messages().iter().find(|m| m.id() == message_id)
                {
                    print!("{}", format_message(message));
                }
            }
            TurnOutcome::Discarded { .. } => {
                println!("A reply arrived for a deleted thread and was dropped.");
            }
        }
    }

    fn thread_at(&self, position: usize) -> Option<ThreadId> {
        self.controller
            .store()
            .threads()
            .get(position.checked_sub(1)?)
            .map(|thread| thread.id())
    }

    fn print_threads(&self) {
        let store = self.controller.store();
        for (index, thread) in store.threads().iter().enumerate() {
            let marker = if thread.id() == store.active_id() { '*' } else { ' ' };
            println!(
                "{marker} {}. {} ({} messages, {} documents, started {})",
                index + 1,
                thread.title(),
                thread.message_count(),
                thread.documents().len(),
                format_timestamp(thread.created_at()),
            );
        }
    }

    fn print_transcript(&self) {
        let thread = self.controller.store().active_thread();
        println!("== {} ==", thread.title());
        for message in thread.messages() {
            print!("{}", format_message(message));
        }
    }

    fn print_errors(&self) {
        self.errors.drain_from(&self.error_rx);
        let groups = self.errors.grouped_by_thread();
        if groups.is_empty() {
            println!("No warnings or errors.");
            return;
        }

        println!(
            "{} errors, {} warnings:",
            self.errors.error_count(),
            self.errors.warning_count()
        );
        for group in &groups {
            println!("{}", self.group_heading(group));
            for entry in &group.entries {
                println!("  {}", format_entry(entry));
            }
        }
    }

    fn group_heading(&self, group: &ThreadErrors) -> String {
        let Some(thread_id) = group.thread_id else {
            return "General:".to_string();
        };

        match self.controller.store().thread(thread_id) {
            Some(thread) => format!(
                "Thread \"{}\" ({} failed turns):",
                thread.title(),
                self.errors.failures_for(thread_id)
            ),
            None => format!("Deleted thread {thread_id}:"),
        }
    }
}

fn format_entry(entry: &ErrorEntry) -> String {
    let level = match entry.level {
        ErrorLevel::Error => "ERROR",
        ErrorLevel::Warning => "WARN",
    };

    let mut line = format!(
        "[{}] {level} {}",
        format_timestamp(entry.timestamp),
        entry.message
    );
    if let Some(status) = entry.status {
        line.push_str(&format!(" (HTTP {status})"));
    }
    for (key, value) in &entry.details {
        line.push_str(&format!(" {key}={value}"));
    }
    line
}
