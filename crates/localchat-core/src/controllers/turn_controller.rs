use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{ConversationsStore, Message, MessageId, ThreadId};
use crate::services::inference_client::{ClientError, InferenceBackend};
use crate::services::request_builder::{self, ChatRequest};
use crate::services::sanitizer::{sanitize, strip_think_blocks};

/// Text of the assistant message appended when a turn fails
pub const FETCH_ERROR_MESSAGE: &str = "An error occurred while fetching the response.";

/// Whether a request is currently in flight
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending { thread_id: ThreadId },
}

/// Why a submission was ignored
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitRejected {
    #[error("input is empty")]
    EmptyInput,

    #[error("a response is still pending")]
    TurnInFlight,
}

/// Ticket for the single turn in flight.
///
/// Only [`TurnController::begin_turn`] hands these out and
/// [`TurnController::complete_turn`] consumes them, so a second turn cannot
/// start before the first one resolves.
#[derive(Debug)]
#[must_use = "a pending turn keeps the controller busy until completed"]
pub struct PendingTurn {
    thread_id: ThreadId,
    request: ChatRequest,
}

impl PendingTurn {
    /// Thread the reply will be delivered to
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

/// How a completed turn was recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Cleaned reply appended to the thread
    Replied {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    /// Generic error message appended to the thread
    Failed {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    /// The thread was deleted while the request was in flight
    Discarded { thread_id: ThreadId },
}

/// Drives user turns: input buffer, in-flight state and the conversation store.
pub struct TurnController {
    store: ConversationsStore,
    state: TurnState,
    input: String,
}

impl TurnController {
    pub fn new(store: ConversationsStore) -> Self {
        Self {
            store,
            state: TurnState::Idle,
            input: String::new(),
        }
    }

    pub fn store(&self) -> &ConversationsStore {
        &self.store
    }

    /// Thread management (create, delete, select, attach) stays available
    /// while a turn is in flight; the reply still goes to its own thread.
    pub fn store_mut(&mut self) -> &mut ConversationsStore {
        &mut self.store
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.state, TurnState::Sending { .. })
    }

    /// Current contents of the input buffer
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Start a turn from the input buffer.
    ///
    /// Appends the user message to the active thread, clears the input and
    /// returns the request to send. Rejected submissions change nothing.
    ///
    /// # Errors
    /// - [`SubmitRejected::TurnInFlight`] while another turn is pending
    /// - [`SubmitRejected::EmptyInput`] if the input is blank
    pub fn begin_turn(&mut self) -> Result<PendingTurn, SubmitRejected> {
        if self.is_sending() {
            debug!("Turn already in flight, ignoring submission");
            return Err(SubmitRejected::TurnInFlight);
        }

        let text = self.input.trim().to_string();
        let thread_id = self.store.active_id();

        // Built from the log before the user message is appended
        let request = request_builder::build(self.store.active_thread().messages(), &text)
            .map_err(|_| {
                debug!("Empty input, ignoring submission");
                SubmitRejected::EmptyInput
            })?;

        let appended = self.store.append_message(thread_id, Message::user(text));
        if let Err(e) = &appended {
            error!(error = %e, thread_id = %thread_id, "Active thread missing from store");
        }
        debug_assert!(appended.is_ok(), "active thread must exist");

        self.input.clear();
        self.state = TurnState::Sending { thread_id };
        debug!(
            thread_id = %thread_id,
            message_count = request.messages.len(),
            "Turn started"
        );

        Ok(PendingTurn { thread_id, request })
    }

    /// Record the backend result for a pending turn and return to idle.
    ///
    /// Replies have `<think>` blocks removed and are sanitized; failures are
    /// logged and replaced by [`FETCH_ERROR_MESSAGE`].
    pub fn complete_turn(
        &mut self,
        pending: PendingTurn,
        result: Result<String, ClientError>,
    ) -> TurnOutcome {
        self.record_result(pending.thread_id, result)
    }

    /// Give up on a pending turn whose result will never arrive, for example
    /// because the task running the request panicked.
    ///
    /// The thread gets the same error message as a failed request.
    pub fn abandon_turn(&mut self, pending: PendingTurn) -> TurnOutcome {
        self.record_abandoned(pending.thread_id)
    }

    /// Run a whole turn against `backend`.
    ///
    /// Dropping the returned future before it resolves abandons the turn, so
    /// the controller never stays in `Sending`.
    ///
    /// # Errors
    /// Returns [`SubmitRejected`] when the input is blank or a turn is pending;
    /// inference failures are recorded in the thread, not returned.
    pub async fn submit<B>(&mut self, backend: &B) -> Result<TurnOutcome, SubmitRejected>
    where
        B: InferenceBackend + ?Sized,
    {
        let PendingTurn { thread_id, request } = self.begin_turn()?;
        let turn = InFlightTurn {
            controller: self,
            thread_id,
            resolved: false,
        };

        let result = backend.complete(&request).await;
        Ok(turn.resolve(result))
    }

    fn record_result(&mut self, thread_id: ThreadId, result: Result<String, ClientError>) -> TurnOutcome {
        let (message, failed) = match result {
            Ok(raw) => {
                let visible = strip_think_blocks(&raw);
                (Message::assistant(sanitize(&visible)), false)
            }
            Err(ClientError::HttpStatus(status)) => {
                error!(status, thread_id = %thread_id, "Inference endpoint returned an error status");
                (Message::assistant_error(FETCH_ERROR_MESSAGE), true)
            }
            Err(e) => {
                error!(error = %e, thread_id = %thread_id, "Inference request failed");
                (Message::assistant_error(FETCH_ERROR_MESSAGE), true)
            }
        };

        self.deliver(thread_id, message, failed)
    }

    fn record_abandoned(&mut self, thread_id: ThreadId) -> TurnOutcome {
        error!(thread_id = %thread_id, "Turn abandoned before the endpoint answered");
        self.deliver(thread_id, Message::assistant_error(FETCH_ERROR_MESSAGE), true)
    }

    /// Append the turn's closing message and return to idle
    fn deliver(&mut self, thread_id: ThreadId, message: Message, failed: bool) -> TurnOutcome {
        debug_assert_eq!(self.state, TurnState::Sending { thread_id });
        self.state = TurnState::Idle;

        let message_id = message.id();
        if self.store.append_message(thread_id, message).is_err() {
            warn!(thread_id = %thread_id, "Thread deleted before its reply arrived, dropping reply");
            return TurnOutcome::Discarded { thread_id };
        }

        if failed {
            TurnOutcome::Failed {
                thread_id,
                message_id,
            }
        } else {
            info!(thread_id = %thread_id, "Turn completed");
            TurnOutcome::Replied {
                thread_id,
                message_id,
            }
        }
    }
}

/// The turn `submit` is waiting on; abandons it when dropped unresolved
struct InFlightTurn<'a> {
    controller: &'a mut TurnController,
    thread_id: ThreadId,
    resolved: bool,
}

impl InFlightTurn<'_> {
    fn resolve(mut self, result: Result<String, ClientError>) -> TurnOutcome {
        self.resolved = true;
        self.controller.record_result(self.thread_id, result)
    }
}

impl Drop for InFlightTurn<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.controller.record_abandoned(self.thread_id);
        }
    }
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new(ConversationsStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::request_builder::RequestRole;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Waker};

    /// Backend returning scripted results and recording requests
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, ClientError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn replying(replies: Vec<Result<String, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError> {
            self.requests.lock().push(request.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))
        }
    }

    fn contents(controller: &TurnController) -> Vec<(Role, String, bool)> {
        controller
            .store()
            .active_thread()
            .messages()
            .iter()
            .map(|m| (m.role(), m.content().to_string(), m.is_error()))
            .collect()
    }

    #[tokio::test]
    async fn test_successful_turn_appends_user_and_assistant() {
        let backend = ScriptedBackend::replying(vec![Ok("Hello!".to_string())]);
        let mut controller = TurnController::default();
        controller.set_input("  Hi  ");

        let outcome = controller.submit(&backend).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Replied { .. }));
        assert_eq!(
            contents(&controller),
            vec![
                (Role::User, "Hi".to_string(), false),
                (Role::Assistant, "Hello!".to_string(), false),
            ]
        );
        assert_eq!(controller.state(), TurnState::Idle);
        assert_eq!(controller.input(), "");
    }

    #[tokio::test]
    async fn test_think_block_is_removed_from_reply() {
        let backend = ScriptedBackend::replying(vec![Ok("<think>plan</think>Hello".to_string())]);
        let mut controller = TurnController::default();
        controller.set_input("hey");

        controller.submit(&backend).await.unwrap();

        let thread = controller.store().active_thread();
        assert_eq!(thread.messages()[1].content(), "Hello");
    }

    #[tokio::test]
    async fn test_reply_is_sanitized() {
        let backend = ScriptedBackend::replying(vec![Ok(
            "<think>\nlet me see\n</think>\n[The area is \\(\\pi r^2\\)]".to_string(),
        )]);
        let mut controller = TurnController::default();
        controller.set_input("area of a circle?");

        controller.submit(&backend).await.unwrap();

        let thread = controller.store().active_thread();
        assert_eq!(thread.messages()[1].content(), "The area is $\\pi r^2$");
    }

    #[tokio::test]
    async fn test_think_only_reply_is_stored_empty() {
        let backend = ScriptedBackend::replying(vec![Ok("<think>hmm</think>".to_string())]);
        let mut controller = TurnController::default();
        controller.set_input("q");

        let outcome = controller.submit(&backend).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Replied { .. }));
        assert_eq!(
            contents(&controller),
            vec![
                (Role::User, "q".to_string(), false),
                (Role::Assistant, String::new(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_input_is_noop() {
        let backend = ScriptedBackend::default();
        let mut controller = TurnController::default();
        controller.set_input("   \n\t");

        let result = controller.submit(&backend).await;

        assert_eq!(result, Err(SubmitRejected::EmptyInput));
        assert_eq!(controller.store().active_thread().message_count(), 0);
        assert_eq!(controller.input(), "   \n\t");
        assert!(backend.requests.lock().is_empty());
        assert_eq!(controller.state(), TurnState::Idle);
    }

    #[test]
    fn test_submission_while_in_flight_is_noop() {
        let mut controller = TurnController::default();
        controller.set_input("first");
        let pending = controller.begin_turn().unwrap();
        assert!(controller.is_sending());

        controller.set_input("second");
        assert_eq!(
            controller.begin_turn().unwrap_err(),
            SubmitRejected::TurnInFlight
        );
        assert_eq!(controller.store().active_thread().message_count(), 1);
        assert_eq!(controller.input(), "second");

        controller.complete_turn(pending, Ok("done".to_string()));
        assert_eq!(controller.state(), TurnState::Idle);

        let pending = controller.begin_turn().unwrap();
        assert_eq!(pending.request().messages.last().unwrap().content, "second");
        controller.complete_turn(pending, Ok("done again".to_string()));
        assert_eq!(controller.store().active_thread().message_count(), 4);
    }

    #[test]
    fn test_user_message_visible_before_request_resolves() {
        let mut controller = TurnController::default();
        controller.set_input("question");

        let pending = controller.begin_turn().unwrap();

        assert_eq!(
            contents(&controller),
            vec![(Role::User, "question".to_string(), false)]
        );
        assert_eq!(controller.input(), "");
        assert_eq!(
            controller.state(),
            TurnState::Sending {
                thread_id: pending.thread_id()
            }
        );
        controller.complete_turn(pending, Ok("answer".to_string()));
    }

    #[tokio::test]
    async fn test_request_uses_log_before_append() {
        let backend = ScriptedBackend::default();
        let mut controller = TurnController::default();
        let id = controller.store().active_id();
        controller
            .store_mut()
            .append_message(id, Message::user("a"))
            .unwrap();
        controller
            .store_mut()
            .append_message(id, Message::assistant("b"))
            .unwrap();
        controller.set_input("c");

        controller.submit(&backend).await.unwrap();

        let requests = backend.requests.lock();
        let sent: Vec<(RequestRole, &str)> = requests[0]
            .messages
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            sent,
            vec![
                (RequestRole::System, ""),
                (RequestRole::User, "a"),
                (RequestRole::Assistant, "b"),
                (RequestRole::User, "c"),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_error_appends_generic_error_message() {
        let backend = ScriptedBackend::replying(vec![Err(ClientError::HttpStatus(500))]);
        let mut controller = TurnController::default();
        controller.set_input("hello");

        let outcome = controller.submit(&backend).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(
            contents(&controller),
            vec![
                (Role::User, "hello".to_string(), false),
                (Role::Assistant, FETCH_ERROR_MESSAGE.to_string(), true),
            ]
        );
        assert_eq!(controller.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_malformed_body_appends_generic_error_message() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let backend = ScriptedBackend::replying(vec![Err(ClientError::MalformedBody(parse_error))]);
        let mut controller = TurnController::default();
        controller.set_input("hello");

        controller.submit(&backend).await.unwrap();

        let last = controller.store().active_thread().messages()[1].clone();
        assert!(last.is_error());
        assert_eq!(last.content(), FETCH_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_turn_after_failure_includes_error_message_in_transcript() {
        let backend = ScriptedBackend::replying(vec![
            Err(ClientError::HttpStatus(503)),
            Ok("back online".to_string()),
        ]);
        let mut controller = TurnController::default();

        controller.set_input("one");
        controller.submit(&backend).await.unwrap();
        controller.set_input("two");
        controller.submit(&backend).await.unwrap();

        let requests = backend.requests.lock();
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[1].messages[2].content, FETCH_ERROR_MESSAGE);
        assert_eq!(controller.store().active_thread().message_count(), 4);
    }

    #[test]
    fn test_reply_lands_on_originating_thread() {
        let mut controller = TurnController::default();
        let origin = controller.store().active_id();
        controller.set_input("question");
        let pending = controller.begin_turn().unwrap();

        let other = controller.store_mut().create_thread();
        let outcome = controller.complete_turn(pending, Ok("answer".to_string()));

        assert!(matches!(outcome, TurnOutcome::Replied { thread_id, .. } if thread_id == origin));
        assert_eq!(controller.store().thread(origin).unwrap().message_count(), 2);
        assert_eq!(controller.store().thread(other).unwrap().message_count(), 0);
        assert_eq!(controller.store().active_id(), other);
    }

    #[test]
    fn test_reply_for_deleted_thread_is_discarded() {
        let mut controller = TurnController::default();
        let origin = controller.store().active_id();
        controller.set_input("question");
        let pending = controller.begin_turn().unwrap();

        controller.store_mut().delete_thread(origin).unwrap();
        let outcome = controller.complete_turn(pending, Ok("answer".to_string()));

        assert_eq!(outcome, TurnOutcome::Discarded { thread_id: origin });
        assert_eq!(controller.store().count(), 1);
        assert_eq!(controller.store().active_thread().message_count(), 0);
        assert_eq!(controller.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_each_submission_adds_exactly_two_messages() {
        let backend = ScriptedBackend::replying(vec![
            Ok("a".to_string()),
            Err(ClientError::HttpStatus(404)),
            Ok("<think>x</think>c".to_string()),
        ]);
        let mut controller = TurnController::default();

        for (i, text) in ["first", "second", "third"].into_iter().enumerate() {
            controller.set_input(text);
            controller.submit(&backend).await.unwrap();
            assert_eq!(
                controller.store().active_thread().message_count(),
                (i + 1) * 2
            );
        }
    }

    /// Backend whose request never finishes
    struct StalledBackend;

    #[async_trait]
    impl InferenceBackend for StalledBackend {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ClientError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_dropped_submit_returns_to_idle() {
        let mut controller = TurnController::default();
        controller.set_input("hello");

        {
            let mut submission = pin!(controller.submit(&StalledBackend));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(submission.as_mut().poll(&mut cx).is_pending());
        }

        assert_eq!(controller.state(), TurnState::Idle);
        assert_eq!(
            contents(&controller),
            vec![
                (Role::User, "hello".to_string(), false),
                (Role::Assistant, FETCH_ERROR_MESSAGE.to_string(), true),
            ]
        );

        controller.set_input("again");
        assert!(controller.begin_turn().is_ok());
    }

    #[test]
    fn test_abandoned_turn_records_error_and_goes_idle() {
        let mut controller = TurnController::default();
        let origin = controller.store().active_id();
        controller.set_input("question");
        let pending = controller.begin_turn().unwrap();

        let outcome = controller.abandon_turn(pending);

        assert!(matches!(outcome, TurnOutcome::Failed { thread_id, .. } if thread_id == origin));
        assert_eq!(controller.state(), TurnState::Idle);
        let last = controller.store().active_thread().messages().last().unwrap();
        assert!(last.is_error());
        assert_eq!(last.content(), FETCH_ERROR_MESSAGE);
    }
}
