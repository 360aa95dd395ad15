// Assistant data models
//
// Wire-level event types for the streaming conversation protocol, the
// finalized message records the timeline stores, and the connection
// channel configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Connection
// ============================================================================

/// Connection state of the duplex channel to the generation service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Default first reconnect delay after an unexpected close
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
/// Default upper bound for the reconnect delay
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Connection channel configuration
///
/// Stores the generation service endpoint and the reconnect backoff bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// WebSocket endpoint of the generation service (ws:// or wss://)
    pub endpoint: String,
    /// First reconnect delay after an unexpected close, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for the reconnect delay, in milliseconds
    pub max_backoff_ms: u64,
}

impl ChannelConfig {
    /// Create a configuration with the default backoff bounds
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

// ============================================================================
// Inbound Events
// ============================================================================

/// Inbound event from the generation service
///
/// Tokens of one generation turn are bracketed by exactly one
/// `llm_start`/`llm_end` pair. Tool events may arrive before, during, or
/// after a turn and must render in the order received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Connection handshake acknowledged
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Echo of the user's submission, carrying the conversation id
    #[serde(rename = "user_message")]
    UserMessage {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    /// A generation turn opened
    #[serde(rename = "llm_start")]
    LlmStart {
        #[serde(rename = "turnId")]
        turn_id: String,
    },
    /// Incremental generated text
    #[serde(rename = "token")]
    Token { text: String },
    /// The open generation turn closed
    #[serde(rename = "llm_end")]
    LlmEnd {},
    /// A tool invocation began
    #[serde(rename = "tool_start")]
    ToolStart {
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Generation turn the invocation belongs to, when the service sends it
        #[serde(rename = "turnId", default, skip_serializing_if = "Option::is_none")]
        turn_id: Option<String>,
    },
    /// A tool invocation finished with output
    #[serde(rename = "tool_end")]
    ToolEnd {
        output: serde_json::Value,
        #[serde(rename = "turnId", default, skip_serializing_if = "Option::is_none")]
        turn_id: Option<String>,
    },
    /// The whole request completed
    #[serde(rename = "complete")]
    Completed {},
    /// The service reported a failure
    #[serde(rename = "error")]
    Failed { message: String },
}

// ============================================================================
// Outbound Payloads
// ============================================================================

/// Outbound frame submitted to the generation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutboundPayload {
    /// A user chat submission
    #[serde(rename = "message")]
    Message {
        message: String,
        /// `None` (serialized as null) means "start a new conversation"
        #[serde(rename = "conversationId")]
        conversation_id: Option<String>,
    },
}

impl OutboundPayload {
    /// Build a user submission, threading the conversation id when known
    pub fn message(text: impl Into<String>, conversation_id: Option<String>) -> Self {
        OutboundPayload::Message {
            message: text.into(),
            conversation_id,
        }
    }
}

// ============================================================================
// Message Records
// ============================================================================

/// Kind of a finalized timeline record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    Thought,
    Tool,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::User => write!(f, "user"),
            MessageKind::Assistant => write!(f, "assistant"),
            MessageKind::Thought => write!(f, "thought"),
            MessageKind::Tool => write!(f, "tool"),
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageKind::User),
            "assistant" => Ok(MessageKind::Assistant),
            "thought" => Ok(MessageKind::Thought),
            "tool" => Ok(MessageKind::Tool),
            _ => Err(format!("Invalid message kind: {}", s)),
        }
    }
}

/// Finalized message record
///
/// Identity is assigned once, at finalization, and never reused. The
/// timeline's sequence order is the only order ever rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Record kind
    pub kind: MessageKind,
    /// Rendered text content
    pub content: String,
    /// When the record was finalized
    pub timestamp: DateTime<Utc>,
    /// Tool name, for tool records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Raw tool output, for tool completion records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<serde_json::Value>,
    /// Generation turn this record belongs to, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
}

impl MessageRecord {
    fn new(kind: MessageKind, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content,
            timestamp: Utc::now(),
            tool_name: None,
            tool_output: None,
            turn_id: None,
        }
    }

    /// Create a user submission record
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content.into())
    }

    /// Create a finalized assistant answer record
    pub fn assistant(content: impl Into<String>, turn_id: Option<String>) -> Self {
        Self {
            turn_id,
            ..Self::new(MessageKind::Assistant, content.into())
        }
    }

    /// Create an extracted reasoning record
    pub fn thought(content: impl Into<String>, turn_id: Option<String>) -> Self {
        Self {
            turn_id,
            ..Self::new(MessageKind::Thought, content.into())
        }
    }

    /// Create the placeholder record for a tool invocation that just began
    pub fn tool_started(tool_name: impl Into<String>, turn_id: Option<String>) -> Self {
        let tool_name = tool_name.into();
        Self {
            tool_name: Some(tool_name.clone()),
            turn_id,
            ..Self::new(MessageKind::Tool, format!("invoking {}…", tool_name))
        }
    }

    /// Create the record carrying a finished tool invocation's output
    pub fn tool_finished(
        tool_name: Option<String>,
        output: serde_json::Value,
        turn_id: Option<String>,
    ) -> Self {
        let content = render_tool_output(&output);
        Self {
            tool_name,
            tool_output: Some(output),
            turn_id,
            ..Self::new(MessageKind::Tool, content)
        }
    }
}

/// Render a tool output value as display text
///
/// Plain strings are shown as-is; structured output keeps its JSON form.
fn render_tool_output(output: &serde_json::Value) -> String {
    match output {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Presentation Status
// ============================================================================

/// Presentation status of the assistant, emitted alongside timeline changes
///
/// Drives the shell's "assistant is working…" affordances; carries no
/// timeline content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssistantStatus {
    /// A submission was sent, generation has not started yet
    Thinking,
    /// Tokens are streaming in
    Generating,
    /// A tool invocation is running
    ToolRunning,
    /// The request finished
    Complete,
    /// The service reported a failure
    Error,
}

// ============================================================================
// Tests
// ============================================================================
