//! Domain events, the event bus seam, and handler isolation for Tally.
//!
//! Internal subsystems publish typed [`Event`]s on a process-wide bus.
//! Consumers (analytics dispatchers, chat notifications) subscribe handlers
//! to an [`EventKind`] and wrap them with [`Isolation`] so that a failing
//! consumer can never affect the publisher or any other consumer.
//!
//! # Event families
//!
//! | Kind | Payload |
//! |------|---------|
//! | `MilestoneCreated` | [`MilestoneCreated`] |
//! | `StripeLiveEnabled` / `StripeLiveDisabled` | [`StripeLiveChange`] |
//! | `Model("post.published")`, ... | [`ModelEvent`] |
//!
//! # Usage
//!
//! ```rust,ignore
//! use tally_events::{DomainEvents, Event, EventBus, EventKind, Isolation};
//!
//! let bus = DomainEvents::new();
//! let isolation = Isolation::default();
//!
//! bus.subscribe(
//!     EventKind::model("post.published"),
//!     isolation.isolate("audit", |event| async move {
//!         tracing::info!(?event, "post published");
//!         Ok::<_, std::io::Error>(())
//!     }),
//! );
//!
//! bus.publish(Event::model("post.published", Default::default()));
//! bus.settled().await;
//! ```

mod bus;
mod error;
mod event;
mod field;
mod isolate;

pub use bus::{DomainEvents, EventBus, Handler, HandlerFuture};
pub use error::{FieldPathError, HandlerFailure, HandlerPanic};
pub use event::{
    Event, EventKind, Milestone, MilestoneCreated, MilestoneMeta, MilestoneType, ModelEvent,
    SkipReason, StripeLiveChange,
};
pub use field::FieldPath;
pub use isolate::{ErrorLogger, ExceptionReporter, Isolation, TracingLogger, TracingReporter};

#[cfg(test)]
mod tests;
