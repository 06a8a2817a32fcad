//! Declarative subscription tables and the generic binder.
//!
//! Every dispatcher describes its event-to-tracking mapping as a table of
//! [`Subscription`]s. [`Registry::subscribe_to_events`] walks the table once
//! and binds one isolated bus handler per entry. Each handler:
//!
//! 1. evaluates the entry's gate, if any (no record when it does not hold),
//! 2. resolves the label,
//! 3. builds the record with [`build_record`],
//! 4. hands it to the sink.
//!
//! Calling `subscribe_to_events` twice binds every entry twice; each publish
//! is then tracked twice.

use std::borrow::Cow;
use std::sync::Arc;

use tally_events::{Event, EventBus, EventKind, Isolation};
use tally_types::TrackDefaults;

use crate::builder::{build_record, Extraction};
use crate::error::{ConfigError, DispatchError};
use crate::sink::AnalyticsSink;

/// Derives a label from the event payload.
pub type LabelFn = fn(&Event) -> Result<&'static str, DispatchError>;

/// Decides whether an event produces a record at all.
pub type Gate = fn(&Event) -> Result<bool, DispatchError>;

/// Human-readable event name, appended to the prefix.
#[derive(Clone)]
pub enum Label {
    /// The same name for every occurrence.
    Fixed(Cow<'static, str>),
    /// A name chosen from the payload.
    Derived(LabelFn),
}

impl Label {
    fn resolve(&self, event: &Event) -> Result<Cow<'_, str>, DispatchError> {
        match self {
            Self::Fixed(name) => Ok(Cow::Borrowed(name.as_ref())),
            Self::Derived(derive) => derive(event).map(Cow::Borrowed),
        }
    }
}

impl std::fmt::Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// One row of a subscription table. Immutable once declared.
#[derive(Clone)]
pub struct Subscription {
    /// Bus identifier to bind to.
    pub kind: EventKind,
    /// Name of the tracked event.
    pub label: Label,
    /// Payload fields copied into the record.
    pub extraction: Option<Extraction>,
    /// Optional trigger condition.
    pub gate: Option<Gate>,
}

impl Subscription {
    /// An entry tracked under a fixed name.
    pub fn new(kind: EventKind, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            label: Label::Fixed(name.into()),
            extraction: None,
            gate: None,
        }
    }

    /// An entry whose name is derived from the payload.
    pub fn derived(kind: EventKind, label: LabelFn) -> Self {
        Self {
            kind,
            label: Label::Derived(label),
            extraction: None,
            gate: None,
        }
    }

    /// Copies payload fields into the record.
    pub fn with_fields(mut self, extraction: Extraction) -> Self {
        self.extraction = Some(extraction);
        self
    }

    /// Only tracks events for which `gate` holds.
    pub fn gated_by(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("extraction", &self.extraction)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

/// Collaborators and configuration shared by every dispatcher.
#[derive(Clone)]
pub struct AnalyticsDeps {
    /// Where tracking records go.
    pub sink: Arc<dyn AnalyticsSink>,
    /// Error containment around each handler.
    pub isolation: Isolation,
    /// Attributes merged into every record.
    pub defaults: TrackDefaults,
    /// Prepended to every event name.
    pub prefix: String,
}

/// Immutable per-dispatch context shared by all handlers of a registry.
struct TrackContext {
    sink: Arc<dyn AnalyticsSink>,
    defaults: TrackDefaults,
    prefix: String,
}

impl TrackContext {
    async fn dispatch(&self, entry: &Subscription, event: &Event) -> Result<(), DispatchError> {
        if let Some(gate) = entry.gate {
            if !gate(event)? {
                tracing::trace!(event = %entry.kind, "event did not meet trigger, skipping");
                return Ok(());
            }
        }

        let label = entry.label.resolve(event)?;
        let record = build_record(
            &self.defaults,
            &self.prefix,
            &label,
            entry.extraction.as_ref(),
            Some(event),
        );

        self.sink.track(record).await?;
        Ok(())
    }
}

/// A validated subscription table bound to its collaborators.
pub struct Registry {
    family: &'static str,
    context: Arc<TrackContext>,
    isolation: Isolation,
    table: Arc<[Arc<Subscription>]>,
}

impl Registry {
    /// Validates the configuration and takes ownership of the table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Defaults` if the defaults lack an identity, or
    /// `ConfigError::InvalidPrefix` if the prefix contains control
    /// characters.
    pub fn new(
        family: &'static str,
        deps: &AnalyticsDeps,
        table: Vec<Subscription>,
    ) -> Result<Self, ConfigError> {
        deps.defaults.validate()?;
        if deps.prefix.chars().any(char::is_control) {
            return Err(ConfigError::InvalidPrefix(deps.prefix.clone()));
        }

        Ok(Self {
            family,
            context: Arc::new(TrackContext {
                sink: Arc::clone(&deps.sink),
                defaults: deps.defaults.clone(),
                prefix: deps.prefix.clone(),
            }),
            isolation: deps.isolation.clone(),
            table: table.into_iter().map(Arc::new).collect(),
        })
    }

    /// The dispatcher family name, used in handler names and logs.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// The subscription table.
    pub fn entries(&self) -> impl Iterator<Item = &Subscription> {
        self.table.iter().map(|entry| &**entry)
    }

    /// Binds one isolated handler per table entry.
    pub fn subscribe_to_events(&self, bus: &dyn EventBus) {
        for entry in self.table.iter() {
            let context = Arc::clone(&self.context);
            let bound = Arc::clone(entry);

            let handler = self.isolation.isolate(
                format!("{}:{}", self.family, entry.kind),
                move |event: Arc<Event>| {
                    let context = Arc::clone(&context);
                    let entry = Arc::clone(&bound);
                    async move { context.dispatch(&entry, &event).await }
                },
            );

            bus.subscribe(entry.kind.clone(), handler);
            tracing::debug!(
                family = self.family,
                event = %entry.kind,
                "bound analytics subscription"
            );
        }

        tracing::info!(
            family = self.family,
            subscriptions = self.table.len(),
            "analytics dispatcher subscribed"
        );
    }
}
