//! Text trip report

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{EventLog, StorageError};

/// Totals the report is built from
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    /// Session start stamp, used in the file name
    pub start_stamp: &'a str,
    pub log: Option<&'a EventLog>,
    pub yawn_warnings: u32,
    pub drowsy_warnings: u32,
    pub drive_time: Duration,
}

/// Safety score: 100 minus 5 per yawn warning and 10 per drowsy warning
pub fn safety_score(yawn_warnings: u32, drowsy_warnings: u32) -> u32 {
    100u32.saturating_sub(
        yawn_warnings
            .saturating_mul(5)
            .saturating_add(drowsy_warnings.saturating_mul(10)),
    )
}

/// Writer for `Trip_Report_<stamp>.txt`
pub struct TripReport;

impl TripReport {
    /// Render the report body (without touching disk)
    pub fn render(input: &ReportInput<'_>) -> String {
        let rule = "-".repeat(30);
        let log_path = input
            .log
            .map(|l| l.path().display().to_string())
            .unwrap_or_else(|| "None".to_string());

        let mut out = format!(
            "\n{rule}\n     TRIP SAFETY REPORT\n{rule}\n\
             Total Drive Time: {minutes:.2} minutes\n\
             Final Driver Safety Score: {score}/100\n\n\
             --- Total Incidents Logged ---\n\
             \x20 - Yawn Warnings: {yawns}\n\
             \x20 - Drowsy Warnings: {drowsy}\n\n\
             Full event log saved to: {log_path}\n{rule}\n",
            rule = rule,
            minutes = input.drive_time.as_secs_f64() / 60.0,
            score = safety_score(input.yawn_warnings, input.drowsy_warnings),
            yawns = input.yawn_warnings,
            drowsy = input.drowsy_warnings,
            log_path = log_path,
        );

        out.push_str("\n--- Full Event Log ---\n");
        if let Some(log) = input.log {
            match log.read_to_string() {
                Ok(content) => out.push_str(&content),
                Err(e) => {
                    warn!("Could not embed trip log: {}", e);
                    out.push_str("Could not read log file contents.\n");
                }
            }
        }
        out
    }

    /// Write the report into `dir` and return its path
    pub fn write(dir: &Path, input: &ReportInput<'_>) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        let path = dir.join(format!("Trip_Report_{}.txt", input.start_stamp));

        fs::write(&path, Self::render(input)).map_err(|e| StorageError::io(&path, e))?;
        info!("Trip report saved to {}", path.display());
        Ok(path)
    }
}
