//! Event-to-analytics translation for Tally.
//!
//! Observes domain and model events on the bus, turns them into normalized
//! [`TrackingRecord`](tally_types::TrackingRecord)s, and forwards them to an
//! [`AnalyticsSink`]. Delivery is best-effort: every handler runs inside the
//! [`Isolation`](tally_events::Isolation) boundary, so neither a mapping
//! failure nor a sink failure ever reaches the publisher.
//!
//! # Dispatchers
//!
//! | Dispatcher | Events | Tracked as |
//! |------------|--------|------------|
//! | [`MilestoneAnalytics`] | `MilestoneCreated` with `value == 100` | `$100 MRR reached` / `100 Members reached` |
//! | [`BillingAnalytics`] | `StripeLiveEnabled`, `StripeLiveDisabled` | `Stripe Live Enabled` / `Stripe Live Disabled` |
//! | [`ModelEventsAnalytics`] | `post.published`, `page.published`, `theme.uploaded`, `integration.added` | `Post Published`, ... |
//!
//! # Usage
//!
//! ```rust,ignore
//! let deps = AnalyticsDeps {
//!     sink: Arc::new(LogSink),
//!     isolation: Isolation::default(),
//!     defaults: TrackDefaults::new("site-1"),
//!     prefix: "[Staging] ".to_string(),
//! };
//!
//! MilestoneAnalytics::new(&deps)?.subscribe_to_events(&bus);
//! BillingAnalytics::new(&deps)?.subscribe_to_events(&bus);
//! ModelEventsAnalytics::new(&deps)?.subscribe_to_events(&bus);
//! ```

mod billing;
mod builder;
mod error;
mod milestone;
mod model;
mod registry;
mod sink;

pub use billing::BillingAnalytics;
pub use builder::{build_record, Extraction, FieldRule};
pub use error::{ConfigError, DispatchError, ExtractionError, SinkError};
pub use milestone::{
    MilestoneAnalytics, ARR_MILESTONE_LABEL, MEMBERS_MILESTONE_LABEL, MILESTONE_TRIGGER_VALUE,
};
pub use model::{model_subscription, ModelEventsAnalytics};
pub use registry::{AnalyticsDeps, Gate, Label, LabelFn, Registry, Subscription};
pub use sink::{
    AnalyticsSink, LogSink, SegmentSettings, SegmentSink, DEFAULT_SEGMENT_ENDPOINT,
    DEFAULT_TIMEOUT,
};
