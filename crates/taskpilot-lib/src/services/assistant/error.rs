// Assistant Engine Error Types

use thiserror::Error;

/// Assistant engine error
#[derive(Error, Debug)]
pub enum AssistantError {
    /// The channel is down; the submission was not delivered
    #[error("not connected, message was not delivered")]
    NotConnected,

    /// A submission arrived while a turn is already in flight
    #[error("a response is already in progress for this conversation")]
    TurnInFlight,

    /// The submission is empty after trimming
    #[error("message is empty")]
    EmptyMessage,

    /// The submission exceeds the accepted length
    #[error("message exceeds {0} characters")]
    MessageTooLong(usize),

    /// Malformed or out-of-sequence event from the service
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The service reported a failure for the current request
    #[error("generation service failure: {0}")]
    RemoteFailure(String),

    /// The configured endpoint cannot be used
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A frame could not be encoded or decoded
    #[error("frame parse error: {0}")]
    ParseError(String),
}

impl From<serde_json::Error> for AssistantError {
    fn from(err: serde_json::Error) -> Self {
        AssistantError::ParseError(err.to_string())
    }
}

/// Result type for assistant operations
pub type AssistantResult<T> = Result<T, AssistantError>;

/// Assistant error codes for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantErrorCode {
    NotConnected,
    TurnInFlight,
    EmptyMessage,
    MessageTooLong,
    Protocol,
    RemoteFailure,
    InvalidEndpoint,
    ParseError,
}

impl AssistantErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantErrorCode::NotConnected => "CHAT_NOT_CONNECTED",
            AssistantErrorCode::TurnInFlight => "CHAT_TURN_IN_FLIGHT",
            AssistantErrorCode::EmptyMessage => "CHAT_EMPTY_MESSAGE",
            AssistantErrorCode::MessageTooLong => "CHAT_MESSAGE_TOO_LONG",
            AssistantErrorCode::Protocol => "CHAT_PROTOCOL_ERROR",
            AssistantErrorCode::RemoteFailure => "CHAT_REMOTE_FAILURE",
            AssistantErrorCode::InvalidEndpoint => "CHAT_INVALID_ENDPOINT",
            AssistantErrorCode::ParseError => "CHAT_PARSE_ERROR",
        }
    }
}

impl AssistantError {
    pub fn code(&self) -> AssistantErrorCode {
        match self {
            AssistantError::NotConnected => AssistantErrorCode::NotConnected,
            AssistantError::TurnInFlight => AssistantErrorCode::TurnInFlight,
            AssistantError::EmptyMessage => AssistantErrorCode::EmptyMessage,
            AssistantError::MessageTooLong(_) => AssistantErrorCode::MessageTooLong,
            AssistantError::Protocol(_) => AssistantErrorCode::Protocol,
            AssistantError::RemoteFailure(_) => AssistantErrorCode::RemoteFailure,
            AssistantError::InvalidEndpoint(_) => AssistantErrorCode::InvalidEndpoint,
            AssistantError::ParseError(_) => AssistantErrorCode::ParseError,
        }
    }
}

impl From<AssistantError> for String {
    fn from(err: AssistantError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_str() {
        assert_eq!(
            AssistantError::NotConnected.code().as_str(),
            "CHAT_NOT_CONNECTED"
        );
        assert_eq!(
            AssistantError::MessageTooLong(100).code().as_str(),
            "CHAT_MESSAGE_TOO_LONG"
        );
    }

    #[test]
    fn test_error_message() {
        let err = AssistantError::MessageTooLong(100);
        assert!(err.to_string().contains("100"));
        let err = AssistantError::Protocol("token with no open turn".to_string());
        assert!(err.to_string().contains("token"));
    }
}
