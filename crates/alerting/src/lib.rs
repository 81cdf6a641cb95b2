//! Emergency Alerting
//!
//! Gates automated emergency messages behind a sustained-drowsiness
//! threshold and an active window, composes the message, and sends it off
//! the tick loop.

mod dispatch;
mod gate;
mod location;
mod message;
mod notifier;

pub use dispatch::{DispatchReport, EmergencyDispatcher, EmergencyRequest, SendKind};
pub use gate::{EmergencyGate, GateConfig};
pub use location::{Geolocator, IpInfoLocator, Location, NoLocation, IPINFO_URL};
pub use message::compose_alert;
pub use notifier::{normalize_number, LogNotifier, Notifier, WebhookNotifier};

use thiserror::Error;

/// Errors at the notification and location boundaries
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),
    #[error("No emergency contact configured")]
    NoContact,
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AlertError {
    /// Short machine-readable reason for log rows
    pub fn reason(&self) -> &'static str {
        match self {
            AlertError::InvalidNumber(_) => "invalid_number",
            AlertError::NoContact => "no_contact",
            AlertError::SendFailed(_) => "send_failed",
            AlertError::LocationUnavailable(_) => "location_unavailable",
            AlertError::Http(_) => "http_error",
        }
    }
}
