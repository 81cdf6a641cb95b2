//! Outbound notification boundary

use serde::Serialize;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::AlertError;

/// Sends one text message to one number.
///
/// Implementations may block for several seconds; callers run them off the
/// tick loop.
pub trait Notifier: Send + Sync {
    fn send(&self, number: &str, body: &str) -> Result<(), AlertError>;
}

/// Normalize a phone number to `+<digits>`.
///
/// Spaces, dashes and parentheses are dropped and a leading `00` becomes
/// `+`. Anything that is not digits afterwards is rejected.
pub fn normalize_number(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = compact.strip_prefix('+') {
        rest
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest
    } else {
        compact.as_str()
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("+{}", digits))
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    number: &'a str,
    body: &'a str,
}

/// Blocking HTTP client built on first use.
///
/// `reqwest::blocking` may not be constructed on an async worker, so the
/// client is created on the blocking thread that first sends.
pub(crate) struct LazyClient {
    timeout: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl LazyClient {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    pub(crate) fn get(&self) -> Result<&reqwest::blocking::Client, AlertError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }

    #[cfg(test)]
    pub(crate) fn is_built(&self) -> bool {
        self.client.get().is_some()
    }
}

/// Posts `{number, body}` as JSON to a messaging webhook; any 2xx is success
pub struct WebhookNotifier {
    url: String,
    client: LazyClient,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AlertError::SendFailed(format!("invalid webhook URL: {}", url)));
        }
        Ok(Self {
            url,
            client: LazyClient::new(timeout),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, number: &str, body: &str) -> Result<(), AlertError> {
        let response = self
            .client
            .get()?
            .post(&self.url)
            .json(&WebhookPayload { number, body })
            .send()?;

        let status = response.status();
        if status.is_success() {
            info!("Webhook accepted message for {}", number);
            Ok(())
        } else {
            warn!("Webhook rejected message: HTTP {}", status);
            Err(AlertError::SendFailed(format!("HTTP {}", status)))
        }
    }
}

/// Notifier that only records and logs what it would have sent
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far as `(number, body)`
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for LogNotifier {
    fn send(&self, number: &str, body: &str) -> Result<(), AlertError> {
        info!("Emergency message for {} (not delivered, log only):\n{}", number, body);
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| AlertError::SendFailed(format!("Lock error: {}", e)))?;
        sent.push((number.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("+44 7700-900 123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_number("0044 (7700) 900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_number("919876543210").as_deref(), Some("+919876543210"));
        assert_eq!(normalize_number("   "), None);
        assert_eq!(normalize_number("+"), None);
        assert_eq!(normalize_number("call me"), None);
    }

    #[test]
    fn test_webhook_rejects_bad_url() {
        assert!(WebhookNotifier::new("ftp://example", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_webhook_constructs_inside_runtime() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", Duration::from_secs(1)).unwrap();
        assert!(!notifier.client.is_built());
        drop(notifier);
    }

    #[test]
    fn test_log_notifier_records() {
        let notifier = LogNotifier::new();
        notifier.send("+1555", "hello").unwrap();
        assert_eq!(notifier.sent(), vec![("+1555".to_string(), "hello".to_string())]);
    }

    proptest! {
        #[test]
        fn normalized_numbers_are_plus_digits(raw in "[0-9 ()+-]{0,20}") {
            if let Some(n) = normalize_number(&raw) {
                prop_assert!(n.starts_with('+'));
                prop_assert!(n.len() > 1);
                prop_assert!(n[1..].chars().all(|c| c.is_ascii_digit()));
            }
        }
    }
}
