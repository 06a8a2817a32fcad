use tally_events::EventKind;

/// Errors raised while delivering a chat notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("milestone notifier received a {0} event")]
    UnexpectedEvent(EventKind),
}
