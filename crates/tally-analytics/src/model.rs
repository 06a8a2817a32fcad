//! Model lifecycle analytics: published posts and pages, uploaded themes,
//! added integrations.

use tally_events::{EventBus, EventKind};

use crate::builder::Extraction;
use crate::error::{ConfigError, ExtractionError};
use crate::registry::{AnalyticsDeps, Registry, Subscription};

/// Declares a model event entry with optional extraction rules
/// (`output key → payload path`).
///
/// # Errors
///
/// Returns [`ExtractionError`] if the rules are invalid.
pub fn model_subscription<I, K, S>(
    event: impl Into<String>,
    name: impl Into<String>,
    fields: I,
) -> Result<Subscription, ExtractionError>
where
    I: IntoIterator<Item = (K, S)>,
    K: Into<String>,
    S: AsRef<str>,
{
    let extraction = Extraction::new(fields)?;
    let event: String = event.into();
    let name: String = name.into();
    let entry = Subscription::new(EventKind::model(event), name);
    Ok(if extraction.is_empty() {
        entry
    } else {
        entry.with_fields(extraction)
    })
}

/// Dispatcher for model lifecycle events.
pub struct ModelEventsAnalytics {
    registry: Registry,
}

impl ModelEventsAnalytics {
    /// Builds the dispatcher with the built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the defaults or prefix are invalid.
    pub fn new(deps: &AnalyticsDeps) -> Result<Self, ConfigError> {
        Self::with_extra(deps, Vec::new())
    }

    /// Builds the dispatcher with the built-in table followed by `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the defaults or prefix are invalid.
    pub fn with_extra(deps: &AnalyticsDeps, extra: Vec<Subscription>) -> Result<Self, ConfigError> {
        let mut table = Self::table()?;
        table.extend(extra);
        Ok(Self {
            registry: Registry::new("model-events", deps, table)?,
        })
    }

    /// The built-in entries.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] only if a built-in rule is malformed.
    pub fn table() -> Result<Vec<Subscription>, ExtractionError> {
        let none: [(&str, &str); 0] = [];
        Ok(vec![
            model_subscription("post.published", "Post Published", none)?,
            model_subscription("page.published", "Page Published", none)?,
            model_subscription("theme.uploaded", "Theme Uploaded", [("name", "name")])?,
            model_subscription("integration.added", "Custom Integration Added", none)?,
        ])
    }

    /// The bound subscription table, built-ins first.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Binds every entry to the bus.
    pub fn subscribe_to_events(&self, bus: &dyn EventBus) {
        self.registry.subscribe_to_events(bus);
    }
}
