//! Per-minute driver state counts from a trip log

use chrono::{Duration as ChronoDuration, NaiveDateTime, Timelike};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::{StorageError, ROW_TIMESTAMP_FORMAT};

/// Timestamp layouts accepted when reading older or hand-edited logs
const TIMESTAMP_FORMATS: [&str; 6] = [
    ROW_TIMESTAMP_FORMAT,
    "%Y-%m-%d_%H-%M-%S",
    "%d-%m-%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Default bucket width
pub const DEFAULT_BUCKET_SECONDS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StateLabel {
    Attentive,
    Yawn,
    Drowsy,
}

impl StateLabel {
    /// Match a row's event type and details against the known states
    pub fn infer(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if ["drows", "sleep", "doze"].iter().any(|k| text.contains(k)) {
            Some(StateLabel::Drowsy)
        } else if text.contains("yawn") {
            Some(StateLabel::Yawn)
        } else if ["attent", "focused", "awake"].iter().any(|k| text.contains(k)) {
            Some(StateLabel::Attentive)
        } else {
            None
        }
    }
}

/// One dated state observation
#[derive(Debug, Clone, PartialEq)]
pub struct StateEvent {
    pub at: NaiveDateTime,
    pub state: StateLabel,
}

/// State counts per fixed-width time bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateBuckets {
    pub bucket_seconds: u32,
    /// Start of each bucket
    pub starts: Vec<NaiveDateTime>,
    pub attentive: Vec<u32>,
    pub yawn: Vec<u32>,
    pub drowsy: Vec<u32>,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Read every row of a trip log that names a driver state.
///
/// Rows with an unreadable timestamp or no recognizable state are skipped.
pub fn extract_state_events(path: &Path) -> Result<Vec<StateEvent>, StorageError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut events = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let at = record.get(0).and_then(parse_timestamp);
        let text = format!("{} {}", record.get(1).unwrap_or(""), record.get(2).unwrap_or(""));
        match (at, StateLabel::infer(&text)) {
            (Some(at), Some(state)) => events.push(StateEvent { at, state }),
            _ => skipped += 1,
        }
    }

    debug!("{} state events read from {} ({} rows skipped)", events.len(), path.display(), skipped);
    Ok(events)
}

/// Count states per bucket.
///
/// The first bucket starts at the earliest event, floored to a multiple of
/// `bucket_seconds` within its minute; buckets are contiguous up to the
/// latest event.
pub fn bucket_state_counts(events: &[StateEvent], bucket_seconds: u32) -> StateBuckets {
    let bucket_seconds = bucket_seconds.max(1);
    let (first, last) = match (
        events.iter().map(|e| e.at).min(),
        events.iter().map(|e| e.at).max(),
    ) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return StateBuckets {
                bucket_seconds,
                ..Default::default()
            }
        }
    };

    let floor = i64::from(first.second() % bucket_seconds);
    let start = first.with_nanosecond(0).unwrap_or(first) - ChronoDuration::seconds(floor);
    let span = (last - start).num_seconds() + 1;
    let count = ((span + i64::from(bucket_seconds) - 1) / i64::from(bucket_seconds)).max(1) as usize;

    let mut buckets = StateBuckets {
        bucket_seconds,
        starts: (0..count)
            .map(|i| start + ChronoDuration::seconds(i as i64 * i64::from(bucket_seconds)))
            .collect(),
        attentive: vec![0; count],
        yawn: vec![0; count],
        drowsy: vec![0; count],
    };

    for event in events {
        let index = ((event.at - start).num_seconds() / i64::from(bucket_seconds)) as usize;
        if index >= count {
            continue;
        }
        let slot = match event.state {
            StateLabel::Attentive => &mut buckets.attentive,
            StateLabel::Yawn => &mut buckets.yawn,
            StateLabel::Drowsy => &mut buckets.drowsy,
        };
        slot[index] += 1;
    }
    buckets
}

/// Bucketed state counts for one trip log
pub fn analyze_log(path: &Path, bucket_seconds: u32) -> Result<StateBuckets, StorageError> {
    let events = extract_state_events(path)?;
    Ok(bucket_state_counts(&events, bucket_seconds))
}
