//! Milestone analytics: tracks the first 100-member and $100 MRR
//! milestones.

use tally_events::{Event, EventBus, EventKind, MilestoneCreated, MilestoneType};

use crate::error::{ConfigError, DispatchError};
use crate::registry::{AnalyticsDeps, Registry, Subscription};

/// Milestone value that produces a tracking record.
pub const MILESTONE_TRIGGER_VALUE: u64 = 100;

/// Label for the revenue milestone.
pub const ARR_MILESTONE_LABEL: &str = "$100 MRR reached";

/// Label for every other milestone type.
pub const MEMBERS_MILESTONE_LABEL: &str = "100 Members reached";

fn milestone(event: &Event) -> Result<&MilestoneCreated, DispatchError> {
    match event {
        Event::MilestoneCreated(payload) => Ok(payload),
        other => Err(DispatchError::UnexpectedEvent {
            expected: EventKind::MilestoneCreated,
            actual: other.kind(),
        }),
    }
}

fn reached_trigger(event: &Event) -> Result<bool, DispatchError> {
    Ok(milestone(event)?.milestone.value == MILESTONE_TRIGGER_VALUE)
}

fn milestone_label(event: &Event) -> Result<&'static str, DispatchError> {
    Ok(match milestone(event)?.milestone.kind {
        MilestoneType::Arr => ARR_MILESTONE_LABEL,
        _ => MEMBERS_MILESTONE_LABEL,
    })
}

/// Dispatcher for `MilestoneCreated` events.
pub struct MilestoneAnalytics {
    registry: Registry,
}

impl MilestoneAnalytics {
    /// Builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the defaults or prefix are invalid.
    pub fn new(deps: &AnalyticsDeps) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: Registry::new("milestones", deps, Self::table())?,
        })
    }

    /// One entry, gated on the trigger value, labelled by milestone type.
    pub fn table() -> Vec<Subscription> {
        vec![Subscription::derived(EventKind::MilestoneCreated, milestone_label)
            .gated_by(reached_trigger)]
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
