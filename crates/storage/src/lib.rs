//! Storage Layer
//!
//! File-backed persistence for a monitoring session:
//! - Append-only CSV trip log
//! - Text trip report with an embedded copy of the log
//! - User settings JSON (name, emergency contact)
//! - Listing and deleting past logs and reports
//! - Per-minute state counts read back from a trip log

mod analytics;
mod event_log;
mod files;
mod report;
mod settings;

pub use analytics::{
    analyze_log, bucket_state_counts, extract_state_events, StateBuckets, StateEvent, StateLabel,
    DEFAULT_BUCKET_SECONDS,
};
pub use event_log::{EventKind, EventLog, LOG_HEADER};
pub use files::{delete_file, list_log_files, list_report_files};
pub use report::{safety_score, ReportInput, TripReport};
pub use settings::UserSettings;

use thiserror::Error;

/// `chrono` format used for file-name timestamps
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `chrono` format used inside log rows
pub const ROW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Trip log {0} is closed")]
    Closed(String),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
