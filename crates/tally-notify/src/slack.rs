//! Slack incoming-webhook delivery.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tally_events::{Event, EventBus, EventKind, Isolation, MilestoneCreated};
use url::Url;

use crate::error::NotifyError;
use crate::message::{milestone_message, SlackMessage};

const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where milestone messages go and which site they describe.
#[derive(Debug, Clone, Default)]
pub struct SlackSettings {
    pub webhook_url: Option<String>,
    pub site_url: String,
}

/// Posts milestone celebrations to a Slack webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifications {
    client: Client,
    settings: SlackSettings,
}

fn valid_webhook(url: Option<&str>) -> Option<Url> {
    let parsed = Url::parse(url?.trim()).ok()?;
    let web = matches!(parsed.scheme(), "http" | "https");
    (web && parsed.host_str().is_some()).then_some(parsed)
}

impl SlackNotifications {
    /// Creates a notifier for the given webhook and site.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Http` if the HTTP client cannot be built.
    pub fn new(settings: SlackSettings) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, settings })
    }

    /// Posts `message` to `url`.
    ///
    /// A missing or malformed URL is logged and skipped; no request is made.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Http` if the request fails, or
    /// `NotifyError::Rejected` on a non-success status.
    pub async fn send(&self, message: &SlackMessage, url: Option<&str>) -> Result<(), NotifyError> {
        let Some(target) = valid_webhook(url) else {
            tracing::error!(
                code = "URL_MISSING_INVALID",
                context = url.unwrap_or_default(),
                "URL empty or invalid."
            );
            return Ok(());
        };

        let response = self.client.post(target).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(username = %message.username, "slack message delivered");
        Ok(())
    }

    /// Formats and sends the celebration for a reached milestone.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn notify_milestone_received(
        &self,
        payload: &MilestoneCreated,
    ) -> Result<(), NotifyError> {
        let message = milestone_message(payload, &self.settings.site_url);
        self.send(&message, self.settings.webhook_url.as_deref())
            .await
    }

    /// Binds one isolated `MilestoneCreated` handler to the bus.
    pub fn subscribe_to_events(self: &Arc<Self>, bus: &dyn EventBus, isolation: &Isolation) {
        let notifier = Arc::clone(self);
        let handler = isolation.isolate("slack:milestones", move |event: Arc<Event>| {
            let notifier = Arc::clone(&notifier);
            async move {
                match &*event {
                    Event::MilestoneCreated(payload) => {
                        notifier.notify_milestone_received(payload).await
                    }
                    other => Err(NotifyError::UnexpectedEvent(other.kind())),
                }
            }
        });

        bus.subscribe(EventKind::MilestoneCreated, handler);
        tracing::info!("slack milestone notifications subscribed");
    }
}
