//! Append-only CSV trip log

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{StorageError, FILE_TIMESTAMP_FORMAT, ROW_TIMESTAMP_FORMAT};

/// Column header of every trip log
pub const LOG_HEADER: [&str; 3] = ["Timestamp", "EventType", "Details"];

/// Event types written to the trip log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TripStart,
    TripEnd,
    State,
    YawnWarning,
    DrowsyWarning,
    DrowsyReset,
    EmergencyEvent,
    BreakDismissed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TripStart => "Trip_Start",
            EventKind::TripEnd => "Trip_End",
            EventKind::State => "State",
            EventKind::YawnWarning => "Yawn_Warning",
            EventKind::DrowsyWarning => "Drowsy_Warning",
            EventKind::DrowsyReset => "Drowsy_Reset",
            EventKind::EmergencyEvent => "WhatsApp_Event",
            EventKind::BreakDismissed => "Break_Dismissed",
        }
    }
}

/// Handle to one session's CSV log.
///
/// Cheap to clone; every append opens the file, writes one row and closes it
/// again, so background tasks can hold their own copy. Clones share the
/// closed flag: once the trip ends, no handle appends any more.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    closed: Arc<AtomicBool>,
}

impl EventLog {
    /// Create `Trip_Log_<stamp>.csv` in `dir` and write the header
    pub fn create(dir: &Path, start_stamp: &str) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        let path = dir.join(format!("Trip_Log_{}.csv", start_stamp));

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(LOG_HEADER)?;
        writer.flush().map_err(|e| StorageError::io(&path, e))?;

        info!("Created trip log {}", path.display());
        Ok(Self::open(path))
    }

    /// Attach to an existing log file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Refuse further appends through this handle and all its clones
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Timestamp for a session starting now, formatted for file names
    pub fn session_stamp() -> String {
        Local::now().format(FILE_TIMESTAMP_FORMAT).to_string()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `Timestamp, EventType, Details` row
    pub fn append(&self, kind: EventKind, details: &str) -> Result<(), StorageError> {
        self.append_raw(kind.as_str(), details)
    }

    /// Append a per-second `State` sample
    pub fn append_state(&self, state: &str) -> Result<(), StorageError> {
        self.append_raw(EventKind::State.as_str(), state)
    }

    /// Best-effort append: failures are logged and dropped
    pub fn record(&self, kind: EventKind, details: &str) {
        match self.append(kind, details) {
            Ok(()) => {}
            Err(StorageError::Closed(_)) => debug!("Trip log closed, skipping {} row", kind.as_str()),
            Err(e) => warn!("Dropping {} log row: {}", kind.as_str(), e),
        }
    }

    fn append_raw(&self, event_type: &str, details: &str) -> Result<(), StorageError> {
        if self.is_closed() {
            return Err(StorageError::Closed(self.path.display().to_string()));
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;

        let ts = Local::now().format(ROW_TIMESTAMP_FORMAT).to_string();
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record([ts.as_str(), event_type, details])?;
        writer.flush().map_err(|e| StorageError::io(&self.path, e))?;

        debug!("Logged {}: {}", event_type, details);
        Ok(())
    }

    /// Raw log contents
    pub fn read_to_string(&self) -> Result<String, StorageError> {
        fs::read_to_string(&self.path).map_err(|e| StorageError::io(&self.path, e))
    }

    /// Parsed rows (header excluded)
    pub fn rows(&self) -> Result<Vec<[String; 3]>, StorageError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push([
                record.get(0).unwrap_or_default().to_string(),
                record.get(1).unwrap_or_default().to_string(),
                record.get(2).unwrap_or_default().to_string(),
            ]);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::create(dir.path(), "2024-01-01_10-00-00").unwrap();

        assert!(log.path().ends_with("Trip_Log_2024-01-01_10-00-00.csv"));
        let content = log.read_to_string().unwrap();
        assert_eq!(content.lines().next(), Some("Timestamp,EventType,Details"));
        assert!(log.rows().unwrap().is_empty());
    }

    #[test]
    fn test_append_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::create(dir.path(), "s").unwrap();

        log.append(EventKind::TripStart, "Detection started.").unwrap();
        log.append_state("drowsy").unwrap();
        log.append(EventKind::YawnWarning, "5 yawns detected, please rest").unwrap();

        let rows = log.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][1], "Trip_Start");
        assert_eq!(rows[1][1], "State");
        assert_eq!(rows[1][2], "drowsy");
        // Comma inside details survives quoting
        assert_eq!(rows[2][2], "5 yawns detected, please rest");
        assert_eq!(rows[0][0].len(), "2024-01-01 10:00:00".len());
    }

    #[test]
    fn test_append_to_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path().join("missing.csv"));
        assert!(matches!(
            log.append(EventKind::TripEnd, "x"),
            Err(StorageError::Io { .. })
        ));
        // Best-effort variant swallows it
        log.record(EventKind::TripEnd, "x");
    }

    #[test]
    fn test_closed_log_rejects_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::create(dir.path(), "s").unwrap();
        let late_writer = log.clone();

        log.append(EventKind::TripEnd, "System disengaged.").unwrap();
        log.close();

        assert!(late_writer.is_closed());
        assert!(matches!(
            late_writer.append(EventKind::EmergencyEvent, "late"),
            Err(StorageError::Closed(_))
        ));
        late_writer.record(EventKind::EmergencyEvent, "late");

        let rows = log.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "Trip_End");
    }
}
