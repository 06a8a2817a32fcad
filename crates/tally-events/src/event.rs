//! Event identifiers and typed payloads published on the domain event bus.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::field::FieldPath;

/// Identifier a handler subscribes to on the bus.
///
/// Domain events are identified by their type; model lifecycle events by
/// their dotted name (`post.published`, `theme.uploaded`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A member or revenue milestone was reached.
    MilestoneCreated,
    /// Live Stripe billing was connected.
    StripeLiveEnabled,
    /// Live Stripe billing was disconnected.
    StripeLiveDisabled,
    /// A model lifecycle event, identified by name.
    Model(Cow<'static, str>),
}

impl EventKind {
    /// Identifier for a named model lifecycle event.
    pub fn model(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Model(name.into())
    }

    /// Returns the canonical label for this identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MilestoneCreated => "MilestoneCreatedEvent",
            Self::StripeLiveEnabled => "StripeLiveEnabledEvent",
            Self::StripeLiveDisabled => "StripeLiveDisabledEvent",
            Self::Model(name) => name,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milestone category. Anything other than `arr` and `members` is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MilestoneType {
    /// Annual recurring revenue.
    Arr,
    /// Member count.
    Members,
    /// Unrecognised category.
    Other(String),
}

impl MilestoneType {
    /// Returns the wire label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Arr => "arr",
            Self::Members => "members",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for MilestoneType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "arr" => Self::Arr,
            "members" => Self::Members,
            _ => Self::Other(value),
        }
    }
}

impl From<MilestoneType> for String {
    fn from(value: MilestoneType) -> Self {
        match value {
            MilestoneType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// A reached milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// Milestone identifier, when persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Milestone category.
    #[serde(rename = "type")]
    pub kind: MilestoneType,
    /// Threshold that was crossed (members, or currency units for ARR).
    #[serde(deserialize_with = "whole_number")]
    pub value: u64,
    /// ISO currency code for ARR milestones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// When the milestone was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the celebration email went out, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent_at: Option<DateTime<Utc>>,
}

/// Accepts `100` and `100.0` alike; fractional or negative values are
/// rejected.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(value) = number.as_u64() {
        return Ok(value);
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&value) => {
            Ok(value as u64)
        }
        _ => Err(D::Error::custom(format!(
            "expected a non-negative whole number, found {number}"
        ))),
    }
}

/// Why no milestone email was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    /// The site has imported members.
    Import,
    /// The previous milestone email was too recent.
    Email,
}

impl SkipReason {
    /// Returns the wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Email => "email",
        }
    }
}

/// Context attached to a milestone event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(
        default,
        rename = "currentARR",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_arr: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_members: Option<u64>,
}

/// Payload of [`Event::MilestoneCreated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneCreated {
    pub milestone: Milestone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MilestoneMeta>,
}

/// Payload of the Stripe live billing events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripeLiveChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of [`Event::Model`]: the event name plus the model's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvent {
    pub event: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// An event published on the bus, decoded at the boundary into one shape
/// per family.
///
/// JSON form is tagged by `type`:
///
/// ```json
/// {"type": "milestone_created", "milestone": {"type": "arr", "value": 100}}
/// {"type": "stripe_live_enabled"}
/// {"type": "model", "event": "theme.uploaded", "data": {"name": "Casper"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MilestoneCreated(MilestoneCreated),
    StripeLiveEnabled(StripeLiveChange),
    StripeLiveDisabled(StripeLiveChange),
    Model(ModelEvent),
}

impl Event {
    /// Convenience constructor for a model lifecycle event.
    pub fn model(event: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::Model(ModelEvent {
            event: event.into(),
            data,
        })
    }

    /// Returns the bus identifier this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MilestoneCreated(_) => EventKind::MilestoneCreated,
            Self::StripeLiveEnabled(_) => EventKind::StripeLiveEnabled,
            Self::StripeLiveDisabled(_) => EventKind::StripeLiveDisabled,
            Self::Model(model) => EventKind::Model(Cow::Owned(model.event.clone())),
        }
    }

    /// Reads a payload field. Missing fields yield `None`; the event itself
    /// is never modified.
    pub fn field(&self, path: &FieldPath) -> Option<Value> {
        use crate::field::Fields;

        let segments = path.segments();
        match self {
            Self::MilestoneCreated(payload) => payload.field(segments),
            Self::StripeLiveEnabled(payload) | Self::StripeLiveDisabled(payload) => {
                payload.field(segments)
            }
            Self::Model(payload) => payload.field(segments),
        }
    }
}
