//! Billing-state analytics: live Stripe billing switched on or off.

use tally_events::{EventBus, EventKind};

use crate::error::ConfigError;
use crate::registry::{AnalyticsDeps, Registry, Subscription};

/// Dispatcher for the Stripe live billing events. The label is chosen by
/// which event fired; the payload is not inspected.
pub struct BillingAnalytics {
    registry: Registry,
}

impl BillingAnalytics {
    /// Builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the defaults or prefix are invalid.
    pub fn new(deps: &AnalyticsDeps) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: Registry::new("billing", deps, Self::table())?,
        })
    }

    /// One fixed-label entry per billing event.
    pub fn table() -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::StripeLiveEnabled, "Stripe Live Enabled"),
            Subscription::new(EventKind::StripeLiveDisabled, "Stripe Live Disabled"),
        ]
    }

    /// The bound subscription table.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Binds the table to the bus.
    pub fn subscribe_to_events(&self, bus: &dyn EventBus) {
        self.registry.subscribe_to_events(bus);
    }
}
