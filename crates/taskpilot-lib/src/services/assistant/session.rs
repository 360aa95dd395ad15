// Conversation Session Controller
//
// Owns one conversation's timeline and in-flight stream state, consumes the
// typed events arriving from the connection channel, and reports
// render-ready changes to an injected observer. All collaboration goes
// through the OutboundSink and SessionObserver seams; there is no ambient
// global state.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::assistant::{
    AssistantStatus, ConnectionState, MessageRecord, OutboundPayload, SessionEvent,
};

use super::accumulator::StreamAccumulator;
use super::channel::ChannelNotification;
use super::error::{AssistantError, AssistantResult};
use super::timeline::Timeline;

/// Longest accepted user submission, in characters
pub const MAX_MESSAGE_CHARS: usize = 8_000;

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No turn in flight
    Idle,
    /// A submission was sent, generation has not started yet
    AwaitingResponse,
    /// Between llm_start and llm_end
    Streaming,
    /// Tool events arriving with no open generation turn
    ToolsOnly,
}

/// Outbound surface of the connection channel, as the controller sees it
pub trait OutboundSink: Send + Sync {
    /// Snapshot of the channel connection state
    fn state(&self) -> ConnectionState;

    /// Deliver a payload now
    ///
    /// Returns `false` without blocking when the channel is not connected;
    /// nothing is queued for later delivery.
    fn send(&self, payload: &OutboundPayload) -> bool;
}

/// Receives render-ready updates from the controller
///
/// Every method defaults to a no-op so hosts implement only what they
/// render.
pub trait SessionObserver: Send + Sync {
    /// A record was appended to the timeline
    fn record_appended(&self, _record: &MessageRecord) {}

    /// The optimistic record `id` was rolled back after a rejected send
    fn record_retracted(&self, _id: &str) {}

    /// The live preview of the in-flight turn changed
    fn preview_changed(&self, _thoughts: &[String], _main_content: &str) {}

    /// The assistant presentation status changed
    fn status_changed(&self, _status: AssistantStatus) {}

    /// Channel connectivity changed
    fn connectivity_changed(&self, _state: ConnectionState) {}

    /// The service reported a failure for the current request
    fn session_failed(&self, _message: &str) {}
}

/// Drives one conversation's connection lifecycle and message timeline
pub struct SessionController {
    state: SessionState,
    timeline: Timeline,
    accumulator: StreamAccumulator,
    conversation_id: Option<String>,
    client_id: Option<String>,
    generating: bool,
    /// Names of started tools awaiting their output, oldest first
    pending_tools: VecDeque<String>,
    sink: Arc<dyn OutboundSink>,
    observer: Arc<dyn SessionObserver>,
}

impl SessionController {
    pub fn new(sink: Arc<dyn OutboundSink>, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            state: SessionState::Idle,
            timeline: Timeline::new(),
            accumulator: StreamAccumulator::new(),
            conversation_id: None,
            client_id: None,
            generating: false,
            pending_tools: VecDeque::new(),
            sink,
            observer,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// All finalized records in render order
    pub fn records(&self) -> &[MessageRecord] {
        self.timeline.records()
    }

    /// Conversation id assigned by the service; `None` until the first echo
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Whether the "assistant is working" indicator should show
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Connection state of the underlying channel
    pub fn connection_state(&self) -> ConnectionState {
        self.sink.state()
    }

    // =========================================================================
    // User Actions
    // =========================================================================

    /// Submit a user message
    ///
    /// Appends the User record optimistically and sends the payload. When
    /// the channel rejects the send, the record is rolled back and
    /// `NotConnected` is returned so the caller restores the input for
    /// retry. Submitting while a turn is in flight is rejected.
    pub fn submit(&mut self, text: &str) -> AssistantResult<()> {
        if matches!(
            self.state,
            SessionState::AwaitingResponse | SessionState::Streaming
        ) {
            return Err(AssistantError::TurnInFlight);
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }
        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AssistantError::MessageTooLong(MAX_MESSAGE_CHARS));
        }

        let payload = OutboundPayload::message(trimmed, self.conversation_id.clone());
        let record = MessageRecord::user(trimmed);
        let record_id = record.id.clone();
        self.append(record);

        if !self.sink.send(&payload) {
            if let Some(retracted) = self.timeline.retract(&record_id) {
                self.observer.record_retracted(&retracted.id);
            }
            return Err(AssistantError::NotConnected);
        }

        self.state = SessionState::AwaitingResponse;
        self.generating = true;
        self.observer.status_changed(AssistantStatus::Thinking);
        Ok(())
    }

    /// Clear the local "generating" indicator
    ///
    /// Cooperative only: the remote service may keep producing, and any
    /// frames it still sends are processed normally.
    pub fn stop_generation(&mut self) {
        self.generating = false;
    }

    /// Start a new conversation: drop the timeline, the conversation id,
    /// and any in-flight streaming state
    pub fn reset(&mut self) {
        self.timeline.clear();
        self.accumulator.abort();
        self.pending_tools.clear();
        self.conversation_id = None;
        self.state = SessionState::Idle;
        self.generating = false;
    }

    // =========================================================================
    // Inbound Events
    // =========================================================================

    /// Process one inbound event
    ///
    /// Events arriving in an unexpected state are logged and dropped; the
    /// remote protocol is trusted but not blindly, since replayed or
    /// duplicated frames are possible.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { client_id } => self.on_connected(client_id),
            SessionEvent::UserMessage { conversation_id } => {
                self.on_user_message(conversation_id)
            }
            SessionEvent::LlmStart { turn_id } => self.on_llm_start(turn_id),
            SessionEvent::Token { text } => self.on_token(&text),
            SessionEvent::LlmEnd {} => self.on_llm_end(),
            SessionEvent::ToolStart { tool_name, turn_id } => {
                self.on_tool_start(tool_name, turn_id)
            }
            SessionEvent::ToolEnd { output, turn_id } => self.on_tool_end(output, turn_id),
            SessionEvent::Completed {} => self.on_completed(),
            SessionEvent::Failed { message } => self.on_failed(&message),
        }
    }

    /// Forward a connectivity transition to the observer
    pub fn handle_connectivity(&mut self, state: ConnectionState) {
        self.observer.connectivity_changed(state);
    }

    fn on_connected(&mut self, client_id: String) {
        log::info!("session connected as client {}", client_id);
        self.client_id = Some(client_id);
    }

    fn on_user_message(&mut self, conversation_id: String) {
        if self.conversation_id.is_none() {
            log::info!("conversation assigned id {}", conversation_id);
        }
        self.conversation_id = Some(conversation_id);
    }

    fn on_llm_start(&mut self, turn_id: String) {
        if self.accumulator.is_open() {
            log::warn!(
                "generation started while turn {:?} is still open, discarding its buffer",
                self.accumulator.turn_id()
            );
            self.accumulator.abort();
        }
        if let Err(err) = self.accumulator.start(turn_id) {
            log::error!("failed to open generation turn: {}", err);
            return;
        }
        self.state = SessionState::Streaming;
        self.generating = true;
        self.observer.status_changed(AssistantStatus::Generating);
    }

    fn on_token(&mut self, text: &str) {
        if let Err(err) = self.accumulator.append(text) {
            log::warn!("{}, dropping frame", err);
            return;
        }
        if let Ok(preview) = self.accumulator.snapshot() {
            self.observer
                .preview_changed(&preview.thoughts, &preview.main_content);
        }
    }

    fn on_llm_end(&mut self) {
        let turn_id = self.accumulator.turn_id().map(str::to_string);
        let decomposition = match self.accumulator.finalize() {
            Ok(decomposition) => decomposition,
            Err(err) => {
                log::warn!("{}, dropping frame", err);
                return;
            }
        };

        for thought in decomposition.thoughts {
            self.append(MessageRecord::thought(thought, turn_id.clone()));
        }
        if !decomposition.main_content.is_empty() {
            self.append(MessageRecord::assistant(
                decomposition.main_content,
                turn_id,
            ));
        }

        self.observer.preview_changed(&[], "");
        self.state = SessionState::Idle;
    }

    fn on_tool_start(&mut self, tool_name: String, turn_id: Option<String>) {
        self.pending_tools.push_back(tool_name.clone());
        self.append(MessageRecord::tool_started(tool_name, turn_id));
        if self.state == SessionState::Idle {
            self.state = SessionState::ToolsOnly;
        }
        self.observer.status_changed(AssistantStatus::ToolRunning);
    }

    fn on_tool_end(&mut self, output: serde_json::Value, turn_id: Option<String>) {
        let tool_name = self.pending_tools.pop_front();
        if tool_name.is_none() {
            log::warn!("tool finished with no matching start");
        }
        self.append(MessageRecord::tool_finished(tool_name, output, turn_id));
    }

    fn on_completed(&mut self) {
        self.generating = false;
        self.state = SessionState::Idle;
        self.observer.status_changed(AssistantStatus::Complete);
    }

    fn on_failed(&mut self, message: &str) {
        if self.accumulator.abort() {
            log::warn!("discarding partial generation output after service failure");
        }
        self.observer.preview_changed(&[], "");
        self.generating = false;
        self.state = SessionState::Idle;
        self.observer.session_failed(message);
        self.observer.status_changed(AssistantStatus::Error);
    }

    fn append(&mut self, record: MessageRecord) {
        let record = self.timeline.push(record);
        self.observer.record_appended(record);
    }
}

/// Consume channel notifications until the channel closes, driving the
/// controller one notification at a time
///
/// All timeline and accumulator mutation happens on this single task, so
/// processing order equals arrival order and no locking is involved.
pub async fn drive_session(
    controller: &mut SessionController,
    notifications: &mut mpsc::UnboundedReceiver<ChannelNotification>,
) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            ChannelNotification::StateChanged(state) => controller.handle_connectivity(state),
            ChannelNotification::Event(event) => controller.handle_event(event),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
