//! Past logs and reports

use std::fs;
use std::path::Path;
use tracing::warn;

fn list_with_extension(dir: &Path, ext: &str) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.to_ascii_lowercase().ends_with(ext))
        .collect();
    // Timestamped names: reverse lexical order is newest first
    files.sort_by(|a, b| b.cmp(a));
    files
}

/// `.csv` trip logs in `dir`, newest first
pub fn list_log_files(dir: &Path) -> Vec<String> {
    list_with_extension(dir, ".csv")
}

/// `.txt` trip reports in `dir`, newest first
pub fn list_report_files(dir: &Path) -> Vec<String> {
    list_with_extension(dir, ".txt")
}

/// Delete a file; `true` only if something was removed
pub fn delete_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "Trip_Log_2024-01-01_09-00-00.csv",
            "Trip_Log_2024-03-01_09-00-00.csv",
            "Trip_Report_2024-01-01_09-00-00.txt",
            "notes.md",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        let logs = list_log_files(dir.path());
        assert_eq!(logs, vec![
            "Trip_Log_2024-03-01_09-00-00.csv".to_string(),
            "Trip_Log_2024-01-01_09-00-00.csv".to_string(),
        ]);
        assert_eq!(list_report_files(dir.path()).len(), 1);

        let target = dir.path().join(&logs[0]);
        assert!(delete_file(&target));
        assert!(!delete_file(&target));
        assert_eq!(list_log_files(dir.path()).len(), 1);
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        assert!(list_log_files(Path::new("/nonexistent/dir")).is_empty());
    }
}
