//! Field paths and typed field accessors over event payloads.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::FieldPathError;
use crate::event::{Milestone, MilestoneCreated, MilestoneMeta, ModelEvent, StripeLiveChange};

/// A dot-separated path into an event payload (`name`, `milestone.value`).
///
/// Validated on construction: no empty path and no empty segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`FieldPathError`] if the path or any segment is empty.
    pub fn parse(raw: &str) -> Result<Self, FieldPathError> {
        if raw.trim().is_empty() {
            return Err(FieldPathError::Empty);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(FieldPathError::EmptySegment(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The individual segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Read-only field lookup over a payload type.
pub(crate) trait Fields {
    /// Resolves `path` against the payload, `None` if any segment is missing.
    fn field(&self, path: &[String]) -> Option<Value>;
}

/// Returns `value` only when the path ends here.
fn leaf(rest: &[String], value: Option<Value>) -> Option<Value> {
    if rest.is_empty() {
        value
    } else {
        None
    }
}

/// Returns the whole nested structure when the path ends at it, otherwise
/// descends into it.
fn nested<T: Fields + Serialize>(rest: &[String], inner: &T) -> Option<Value> {
    if rest.is_empty() {
        serde_json::to_value(inner).ok()
    } else {
        inner.field(rest)
    }
}

impl Fields for Milestone {
    fn field(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        let value = match head.as_str() {
            "id" => self.id.clone().map(Value::from),
            "type" => Some(Value::from(self.kind.as_str())),
            "value" => Some(Value::from(self.value)),
            "currency" => self.currency.clone().map(Value::from),
            "createdAt" => self.created_at.map(|at| Value::from(at.to_rfc3339())),
            "emailSentAt" => self.email_sent_at.map(|at| Value::from(at.to_rfc3339())),
            _ => None,
        };
        leaf(rest, value)
    }
}

impl Fields for MilestoneMeta {
    fn field(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        let value = match head.as_str() {
            "reason" => self.reason.map(|reason| Value::from(reason.as_str())),
            "currentARR" => self.current_arr.map(Value::from),
            "currentMembers" => self.current_members.map(Value::from),
            _ => None,
        };
        leaf(rest, value)
    }
}

impl Fields for MilestoneCreated {
    fn field(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        match head.as_str() {
            "milestone" => nested(rest, &self.milestone),
            "meta" => self.meta.as_ref().and_then(|meta| nested(rest, meta)),
            _ => None,
        }
    }
}

impl Fields for StripeLiveChange {
    fn field(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        match head.as_str() {
            "message" => leaf(rest, self.message.clone().map(Value::from)),
            _ => None,
        }
    }
}

impl Fields for ModelEvent {
    fn field(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        let mut current = self.data.get(head)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}
