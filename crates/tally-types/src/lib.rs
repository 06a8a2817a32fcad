//! Shared types for the Tally analytics layer.
//!
//! This crate holds the leaf data model used by every other crate in the
//! workspace: the process-wide [`TrackDefaults`] configured once at startup,
//! and the normalized [`TrackingRecord`] handed to the analytics sink for each
//! tracked event occurrence.
//!
//! A tracking record always serializes to a flat JSON object:
//!
//! ```json
//! { "userId": "u1", "properties": {}, "event": "[Test] Post Published", "name": "Casper" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record key holding the identity of the tracked user or site.
pub const USER_ID_KEY: &str = "userId";

/// Record key holding the static properties mapping.
pub const PROPERTIES_KEY: &str = "properties";

/// Record key holding the prefixed event label. Never overwritten by
/// extracted fields.
pub const EVENT_KEY: &str = "event";

/// Default attributes merged into every tracking record.
///
/// Supplied once when the dispatchers are constructed and never mutated
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDefaults {
    /// Identity the analytics sink attributes events to.
    pub user_id: String,
    /// Static properties attached to every event.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl TrackDefaults {
    /// Creates defaults for the given identity with no properties.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            properties: Map::new(),
        }
    }

    /// Adds a static property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Checks that the identity key is present.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError::MissingIdentity`] if `user_id` is blank.
    pub fn validate(&self) -> Result<(), DefaultsError> {
        if self.user_id.trim().is_empty() {
            return Err(DefaultsError::MissingIdentity);
        }
        Ok(())
    }

    /// Returns the defaults as record fields (`userId`, `properties`).
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(USER_ID_KEY.to_string(), Value::String(self.user_id.clone()));
        fields.insert(
            PROPERTIES_KEY.to_string(),
            Value::Object(self.properties.clone()),
        );
        fields
    }
}

/// Errors raised when validating [`TrackDefaults`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefaultsError {
    /// The identity key is empty.
    #[error("track defaults are missing the `userId` identity")]
    MissingIdentity,
}

/// A normalized analytics call.
///
/// Built fresh for every event occurrence and moved into the sink; nothing
/// keeps a reference to it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingRecord(Map<String, Value>);

impl TrackingRecord {
    /// Creates a record holding the default attributes and the event label.
    pub fn new(defaults: &TrackDefaults, event: impl Into<String>) -> Self {
        let mut fields = defaults.to_fields();
        fields.insert(EVENT_KEY.to_string(), Value::String(event.into()));
        Self(fields)
    }

    /// The prefixed event label.
    pub fn event(&self) -> Option<&str> {
        self.0.get(EVENT_KEY).and_then(Value::as_str)
    }

    /// The identity the record is attributed to, if still present.
    pub fn user_id(&self) -> Option<&str> {
        self.0.get(USER_ID_KEY).and_then(Value::as_str)
    }

    /// Returns a field by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the record carries the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over the record's keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets an extracted field, replacing any default under the same key.
    ///
    /// Returns `false` without touching the record when `key` is
    /// [`EVENT_KEY`].
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if key == EVENT_KEY {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    /// Removes a field so that it is absent from the delivered record.
    ///
    /// Returns `false` without touching the record when `key` is
    /// [`EVENT_KEY`].
    pub fn clear_field(&mut self, key: &str) -> bool {
        if key == EVENT_KEY {
            return false;
        }
        self.0.remove(key);
        true
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record, returning the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_require_identity() {
        assert_eq!(
            TrackDefaults::new("  ").validate(),
            Err(DefaultsError::MissingIdentity)
        );
        assert!(TrackDefaults::new("site-1").validate().is_ok());
    }

    #[test]
    fn defaults_deserialize_from_camel_case() {
        let defaults: TrackDefaults =
            serde_json::from_value(json!({"userId": "u1", "properties": {"plan": "pro"}}))
                .unwrap();
        assert_eq!(defaults.user_id, "u1");
        assert_eq!(defaults.properties["plan"], "pro");

        let bare: TrackDefaults = serde_json::from_value(json!({"userId": "u2"})).unwrap();
        assert!(bare.properties.is_empty());
    }

    #[test]
    fn record_serializes_flat() {
        let defaults = TrackDefaults::new("u1").with_property("env", "test");
        let record = TrackingRecord::new(&defaults, "[Test] Post Published");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "userId": "u1",
                "properties": {"env": "test"},
                "event": "[Test] Post Published"
            })
        );
        assert_eq!(record.event(), Some("[Test] Post Published"));
        assert_eq!(record.user_id(), Some("u1"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn record_fields_override_defaults_but_not_event() {
        let mut record = TrackingRecord::new(&TrackDefaults::new("u1"), "Label");

        assert!(record.set_field(USER_ID_KEY, json!("override")));
        assert_eq!(record.user_id(), Some("override"));

        assert!(!record.set_field(EVENT_KEY, json!("hijacked")));
        assert!(!record.clear_field(EVENT_KEY));
        assert_eq!(record.event(), Some("Label"));

        assert!(record.clear_field(PROPERTIES_KEY));
        assert!(!record.contains_key(PROPERTIES_KEY));
    }
}
