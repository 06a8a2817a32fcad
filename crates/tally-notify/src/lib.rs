//! Chat notifications for Tally.
//!
//! Posts a Slack message when a milestone is reached. Delivery happens in a
//! bus handler wrapped by [`Isolation`](tally_events::Isolation), so a
//! webhook outage is logged and reported but never reaches the publisher.

mod error;
mod message;
mod slack;

pub use error::NotifyError;
pub use message::{
    format_amount, format_date, milestone_message, Block, SlackMessage, Text, SLACK_USERNAME,
};
pub use slack::{SlackNotifications, SlackSettings};
