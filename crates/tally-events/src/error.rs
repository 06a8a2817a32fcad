//! Error types for event payload access and handler isolation.

use std::borrow::Cow;

use crate::event::EventKind;

/// Errors raised when parsing a [`FieldPath`](crate::FieldPath).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldPathError {
    /// The path is empty or whitespace.
    #[error("field path is empty")]
    Empty,

    /// The path contains an empty segment (`a..b`, `.a`, `a.`).
    #[error("field path `{0}` contains an empty segment")]
    EmptySegment(String),
}

/// A failure contained by the isolation wrapper.
///
/// This is the value handed to the [`ErrorLogger`](crate::ErrorLogger) and
/// [`ExceptionReporter`](crate::ExceptionReporter).
#[derive(Debug, thiserror::Error)]
#[error("handler `{handler}` failed on {event}: {source}")]
pub struct HandlerFailure {
    /// Name the handler was registered under.
    pub handler: Cow<'static, str>,
    /// Identifier of the event being handled.
    pub event: EventKind,
    /// The underlying error (or caught panic).
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// A panic caught while running a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler panicked: {0}")]
pub struct HandlerPanic(pub String);

impl HandlerPanic {
    /// Extracts a message from a panic payload.
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self(message)
    }
}
