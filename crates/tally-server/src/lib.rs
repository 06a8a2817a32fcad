//! Tally server library logic.
//!
//! Wires the configured dispatchers onto the process-wide event bus and
//! exposes a small HTTP surface for publishing events into it.

pub mod config;
pub mod themes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tally_analytics::{
    model_subscription, AnalyticsDeps, AnalyticsSink, BillingAnalytics, ExtractionError, LogSink,
    MilestoneAnalytics, ModelEventsAnalytics, SegmentSettings, SegmentSink, SinkError,
};
use tally_events::{DomainEvents, Event, Isolation};
use tally_notify::{NotifyError, SlackNotifications, SlackSettings};
use tally_types::TrackDefaults;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide event bus.
    pub bus: Arc<DomainEvents>,
}

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Analytics(#[from] tally_analytics::ConfigError),

    #[error("invalid model event entry: {0}")]
    ModelEvent(#[from] ExtractionError),

    #[error("failed to create analytics sink: {0}")]
    Sink(#[from] SinkError),

    #[error("failed to create slack notifier: {0}")]
    Slack(#[from] NotifyError),
}

/// Maximum request body size (256 KiB).
const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// Builds the analytics collaborators from configuration.
///
/// Without a Segment write key, records are logged instead of delivered.
///
/// # Errors
///
/// Returns `StartupError::Sink` if the Segment endpoint is invalid.
pub fn analytics_deps(config: &Config, isolation: &Isolation) -> Result<AnalyticsDeps, StartupError> {
    let analytics = &config.analytics;

    let sink: Arc<dyn AnalyticsSink> = match &analytics.segment.write_key {
        Some(write_key) => {
            let sink = SegmentSink::new(SegmentSettings {
                write_key: write_key.clone(),
                endpoint: analytics.segment.endpoint.clone(),
                timeout: Duration::from_secs(analytics.segment.timeout_secs),
            })?;
            tracing::info!(url = %sink.track_url(), "delivering analytics to segment");
            Arc::new(sink)
        }
        None => {
            tracing::info!("no segment write key configured, logging analytics events");
            Arc::new(LogSink)
        }
    };

    let user_id = if analytics.user_id.trim().is_empty() {
        config.site.url.clone()
    } else {
        analytics.user_id.clone()
    };

    Ok(AnalyticsDeps {
        sink,
        isolation: isolation.clone(),
        defaults: TrackDefaults {
            user_id,
            properties: analytics.properties.clone(),
        },
        prefix: analytics.prefix.clone(),
    })
}

/// Subscribes the milestone, billing and model-lifecycle dispatchers.
///
/// # Errors
///
/// Returns `StartupError` if the defaults, prefix, or an extra model event
/// entry are invalid. Nothing is subscribed in that case.
pub fn subscribe_analytics(
    config: &Config,
    deps: &AnalyticsDeps,
    bus: &DomainEvents,
) -> Result<(), StartupError> {
    let extra = config
        .analytics
        .model_events
        .iter()
        .map(|entry| {
            model_subscription(
                entry.event.clone(),
                entry.name.clone(),
                entry.fields.iter().map(|(output, source)| (output.clone(), source)),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let milestones = MilestoneAnalytics::new(deps)?;
    let billing = BillingAnalytics::new(deps)?;
    let model = ModelEventsAnalytics::with_extra(deps, extra)?;

    milestones.subscribe_to_events(bus);
    billing.subscribe_to_events(bus);
    model.subscribe_to_events(bus);
    Ok(())
}

/// Wires every configured consumer onto the bus.
///
/// # Errors
///
/// Returns `StartupError` on invalid analytics or notifier configuration.
pub fn start(config: &Config, bus: &DomainEvents, isolation: &Isolation) -> Result<(), StartupError> {
    if config.analytics.enabled {
        let deps = analytics_deps(config, isolation)?;
        subscribe_analytics(config, &deps, bus)?;
    } else {
        tracing::info!("analytics disabled");
    }

    if config.slack.enabled {
        let slack = Arc::new(SlackNotifications::new(SlackSettings {
            webhook_url: config.slack.webhook_url.clone(),
            site_url: config.site.url.clone(),
        })?);
        slack.subscribe_to_events(bus, isolation);
    }

    Ok(())
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Publishes a decoded event and reports how many handlers were scheduled.
async fn publish_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(event): Json<Event>,
) -> (StatusCode, Json<Value>) {
    let kind = event.kind();
    let dispatched = state.bus.publish(event);
    tracing::debug!(event = %kind, dispatched, "event accepted");
    (StatusCode::ACCEPTED, Json(json!({ "dispatched": dispatched })))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/events", post(publish_event_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
