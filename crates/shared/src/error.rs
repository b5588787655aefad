use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the relay refused a client frame. Rejections go only to the sending
/// socket and never reach other participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Not a `send_message` request, or the text is blank.
    Validation,
    /// Frame larger than the relay's `max_message_bytes`.
    PayloadTooLarge,
}

/// Wire form of a rejection, carried by `RelayEvent::Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Relay-side rejection raised while parsing a frame; converted to [`ApiError`]
/// before it is written back to the socket.
#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ApiException> for ApiError {
    fn from(value: ApiException) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
