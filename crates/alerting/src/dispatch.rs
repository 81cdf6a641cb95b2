//! Background emergency sends

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use storage::{EventKind, EventLog, UserSettings};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{compose_alert, normalize_number, AlertError, EmergencyGate, Geolocator, Notifier};

/// What triggered a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendKind {
    Auto,
    Manual,
}

impl SendKind {
    fn label(&self) -> &'static str {
        match self {
            SendKind::Auto => "auto-send",
            SendKind::Manual => "manual_send",
        }
    }
}

/// A send the gate has already approved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmergencyRequest {
    pub kind: SendKind,
    /// Length of the drowsy streak being reported (0 for manual sends)
    pub drowsy_seconds: u64,
}

/// Result of one send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub kind: SendKind,
    pub ok: bool,
    pub reason: String,
}

/// Everything a send needs, owned so it can move onto a blocking thread
#[derive(Clone)]
pub struct EmergencyDispatcher {
    notifier: Arc<dyn Notifier>,
    locator: Arc<dyn Geolocator>,
    settings_path: PathBuf,
    active_window_min: u64,
}

impl EmergencyDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        locator: Arc<dyn Geolocator>,
        settings_path: impl Into<PathBuf>,
        active_window_min: u64,
    ) -> Self {
        Self {
            notifier,
            locator,
            settings_path: settings_path.into(),
            active_window_min,
        }
    }

    /// Run one attempt on the current thread. Never panics, never retries.
    ///
    /// Rows go to `log` only while it is open; a send that outlives its
    /// trip is reported but not logged.
    pub fn send_blocking(&self, request: &EmergencyRequest, log: Option<&EventLog>) -> DispatchReport {
        let record = |details: &str| {
            if let Some(log) = log {
                log.record(EventKind::EmergencyEvent, details);
            }
        };

        let settings = UserSettings::load(&self.settings_path);
        let number = match settings.emergency_number().map(normalize_number) {
            Some(Some(number)) => number,
            Some(None) => {
                let err = AlertError::InvalidNumber(settings.emergency_whatsapp.clone());
                warn!("{}", err);
                record(&format!("{}: {}", request.kind.label(), err));
                return self.finish(request.kind, Err(err));
            }
            None => {
                warn!("No emergency number configured; skipping {}", request.kind.label());
                record(&format!("{}: no phone configured", request.kind.label()));
                return self.finish(request.kind, Err(AlertError::NoContact));
            }
        };

        let location = match self.locator.lookup() {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("Sending without location: {}", e);
                None
            }
        };

        let body = compose_alert(
            &settings.user_name,
            request.drowsy_seconds,
            location.as_ref(),
            self.active_window_min,
        );

        let result = self.notifier.send(&number, &body);
        let reason = match &result {
            Ok(()) => "sent".to_string(),
            Err(e) => e.to_string(),
        };
        record(&format!(
            "{} to {}: ok={} reason={}; active_until set",
            request.kind.label(),
            number,
            result.is_ok(),
            reason
        ));
        self.finish(request.kind, result)
    }

    fn finish(&self, kind: SendKind, result: Result<(), AlertError>) -> DispatchReport {
        let (ok, reason, outcome) = match result {
            Ok(()) => (true, "sent".to_string(), "ok"),
            Err(e) => (false, e.to_string(), e.reason()),
        };
        let kind_label = match kind {
            SendKind::Auto => "auto",
            SendKind::Manual => "manual",
        };
        metrics::counter!("dms_emergency_attempts_total", "kind" => kind_label, "outcome" => outcome)
            .increment(1);
        if ok {
            info!("Emergency {} delivered", kind_label);
        }
        DispatchReport { kind, ok, reason }
    }

    /// Send on a blocking worker. The gate's active window restarts when
    /// the attempt finishes, whatever its outcome.
    pub fn dispatch(
        &self,
        request: EmergencyRequest,
        gate: Arc<EmergencyGate>,
        log: Option<EventLog>,
    ) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::task::spawn_blocking(move || {
            let report = dispatcher.send_blocking(&request, log.as_ref());
            gate.record_attempt_finished(Instant::now());
            if !report.ok {
                error!("Emergency {:?} failed: {}", report.kind, report.reason);
            }
            report
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GateConfig, LogNotifier, Location, NoLocation};
    use std::path::Path;

    struct FixedLocation;

    impl Geolocator for FixedLocation {
        fn lookup(&self) -> Result<Location, AlertError> {
            Ok(Location {
                lat: 48.1,
                lon: 11.6,
                place: "Munich, Bavaria, DE".into(),
            })
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _number: &str, _body: &str) -> Result<(), AlertError> {
            Err(AlertError::SendFailed("HTTP 500".into()))
        }
    }

    fn write_settings(dir: &Path, number: &str) -> PathBuf {
        let path = dir.join("user_settings.json");
        UserSettings {
            user_name: "Ana".into(),
            emergency_whatsapp: number.into(),
        }
        .save(&path)
        .unwrap();
        path
    }

    const AUTO: EmergencyRequest = EmergencyRequest {
        kind: SendKind::Auto,
        drowsy_seconds: 27,
    };

    #[test]
    fn test_send_with_location() {
        let dir = tempfile::tempdir().unwrap();
        let settings = write_settings(dir.path(), "0049 151 2345-678");
        let log = EventLog::create(dir.path(), "t").unwrap();
        let notifier = Arc::new(LogNotifier::new());
        let dispatcher = EmergencyDispatcher::new(notifier.clone(), Arc::new(FixedLocation), settings, 15);

        let report = dispatcher.send_blocking(&AUTO, Some(&log));
        assert!(report.ok);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+491512345678");
        assert!(sent[0].1.contains("Ana was detected drowsy for 27 seconds"));
        assert!(sent[0].1.contains("query=48.1,11.6"));

        let rows = log.rows().unwrap();
        assert_eq!(rows[0][1], "WhatsApp_Event");
        assert!(rows[0][2].contains("ok=true"));
    }

    #[test]
    fn test_missing_number_skips_send() {
        let dir = tempfile::tempdir().unwrap();
        let settings = write_settings(dir.path(), "  ");
        let log = EventLog::create(dir.path(), "t").unwrap();
        let notifier = Arc::new(LogNotifier::new());
        let dispatcher = EmergencyDispatcher::new(notifier.clone(), Arc::new(NoLocation), settings, 15);

        let report = dispatcher.send_blocking(&AUTO, Some(&log));
        assert!(!report.ok);
        assert!(notifier.sent().is_empty());
        assert!(log.rows().unwrap()[0][2].contains("no phone configured"));
    }

    #[test]
    fn test_send_after_trip_end_leaves_log_alone() {
        let dir = tempfile::tempdir().unwrap();
        let settings = write_settings(dir.path(), "+15550100");
        let log = EventLog::create(dir.path(), "t").unwrap();
        log.append(EventKind::TripEnd, "System disengaged.").unwrap();
        log.close();

        let notifier = Arc::new(LogNotifier::new());
        let dispatcher = EmergencyDispatcher::new(notifier.clone(), Arc::new(NoLocation), settings, 15);
        let report = dispatcher.send_blocking(&AUTO, Some(&log));

        assert!(report.ok);
        assert_eq!(notifier.sent().len(), 1);
        let rows = log.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "Trip_End");
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let settings = write_settings(dir.path(), "+15550100");
        let dispatcher = EmergencyDispatcher::new(Arc::new(FailingNotifier), Arc::new(NoLocation), settings, 15);

        let report = dispatcher.send_blocking(&AUTO, None);
        assert!(!report.ok);
        assert!(report.reason.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_dispatch_restarts_window() {
        let dir = tempfile::tempdir().unwrap();
        let settings = write_settings(dir.path(), "+15550100");
        let notifier = Arc::new(LogNotifier::new());
        let dispatcher = EmergencyDispatcher::new(notifier.clone(), Arc::new(NoLocation), settings, 15);

        let gate = Arc::new(EmergencyGate::new(&GateConfig::default()));
        let claimed_at = Instant::now();
        assert!(gate.manual_send(claimed_at));
        let claimed_until = gate.active_until().unwrap();

        let request = EmergencyRequest {
            kind: SendKind::Manual,
            drowsy_seconds: 0,
        };
        let report = dispatcher.dispatch(request, gate.clone(), None).await.unwrap();
        assert!(report.ok);
        assert_eq!(notifier.sent().len(), 1);
        assert!(notifier.sent()[0].1.ends_with("Location not available."));
        assert!(gate.active_until().unwrap() >= claimed_until);
    }
}
