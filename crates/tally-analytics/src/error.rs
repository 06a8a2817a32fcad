//! Error types for the analytics dispatchers.

use tally_events::{EventKind, FieldPathError};
use tally_types::DefaultsError;

/// Construction-time errors. These surface to the caller instead of being
/// contained.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The track defaults are unusable.
    #[error("invalid track defaults: {0}")]
    Defaults(#[from] DefaultsError),

    /// The event label prefix contains control characters.
    #[error("analytics prefix {0:?} contains control characters")]
    InvalidPrefix(String),

    /// A subscription's extraction rules are invalid.
    #[error("invalid extraction rules: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Errors raised when declaring extraction rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// An output key is empty.
    #[error("extraction output key is empty")]
    EmptyKey,

    /// An output key would overwrite the event label.
    #[error("extraction output key `{0}` is reserved")]
    ReservedKey(String),

    /// The same output key is declared more than once.
    #[error("extraction output key `{0}` is declared twice")]
    DuplicateKey(String),

    /// A source path is malformed.
    #[error("extraction source for `{output}` is invalid: {source}")]
    Path {
        /// The output key the rule writes to.
        output: String,
        /// Why the path was rejected.
        source: FieldPathError,
    },
}

/// Per-event failures. Only ever observed by the isolation wrapper.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handler received an event of a different shape than it was
    /// declared for.
    #[error("expected a {expected} event, received {actual}")]
    UnexpectedEvent {
        /// Kind the subscription was declared for.
        expected: EventKind,
        /// Kind actually delivered.
        actual: EventKind,
    },

    /// The analytics sink failed to accept the record.
    #[error("analytics delivery failed: {0}")]
    Delivery(#[from] SinkError),
}

/// Errors raised by an [`AnalyticsSink`](crate::AnalyticsSink).
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The HTTP request could not be built or sent.
    #[error("analytics request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured endpoint is not a valid base URL.
    #[error("invalid analytics endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// The endpoint answered with a non-success status.
    #[error("analytics endpoint rejected the call with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },
}
