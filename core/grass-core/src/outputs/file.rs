use chrono::Local;
use fs_err::{self as fs, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::OutputSink;
use crate::error::{Result, TrackerError};

pub const DEFAULT_LOG_FILE: &str = "activity_log.txt";

const HEADER_TITLE: &str = "Go Touch Grass Activity Log";
const HEADER_RULE_WIDTH: usize = 30;

/// Appends timestamped messages to a plain-text activity log.
///
/// The header is written once, when the file does not exist yet.
pub struct FileOutput {
    log_file: PathBuf,
}

impl FileOutput {
    pub fn new(log_file: &Path) -> Result<Self> {
        if !log_file.exists() {
            if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|err| TrackerError::io("Failed to create activity log dir", err))?;
            }
            let header = format!("{}\n{}\n\n", HEADER_TITLE, "=".repeat(HEADER_RULE_WIDTH));
            fs::write(log_file, header)
                .map_err(|err| TrackerError::io("Failed to create activity log", err))?;
        }

        Ok(Self {
            log_file: log_file.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_file
    }
}

impl OutputSink for FileOutput {
    fn name(&self) -> &'static str {
        "file"
    }

    fn deliver(&self, message: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("[{}] {}\n", timestamp, message);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .map_err(|err| TrackerError::Delivery {
                sink: "file",
                details: format!("Failed to open log file: {}", err),
            })?;

        file.write_all(entry.as_bytes())
            .map_err(|err| TrackerError::Delivery {
                sink: "file",
                details: format!("Failed to write to log file: {}", err),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_file_with_header() {
        let temp = tempfile::tempdir().unwrap();
        let log_file = temp.path().join("test_log.txt");

        FileOutput::new(&log_file).unwrap();

        let content = std::fs::read_to_string(&log_file).unwrap();
        assert_eq!(
            content,
            "Go Touch Grass Activity Log\n==============================\n\n"
        );
    }

    #[test]
    fn appends_messages_after_header() {
        let temp = tempfile::tempdir().unwrap();
        let log_file = temp.path().join("test_log.txt");
        let output = FileOutput::new(&log_file).unwrap();

        output.deliver("first message").unwrap();
        output.deliver("second message").unwrap();

        let content = std::fs::read_to_string(&log_file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Go Touch Grass Activity Log");
        assert!(lines[3].ends_with("] first message"));
        assert!(lines[4].ends_with("] second message"));
    }

    #[test]
    fn existing_file_keeps_its_content() {
        let temp = tempfile::tempdir().unwrap();
        let log_file = temp.path().join("existing.txt");
        std::fs::write(&log_file, "older entries\n").unwrap();

        let output = FileOutput::new(&log_file).unwrap();
        output.deliver("new entry").unwrap();

        let content = std::fs::read_to_string(&log_file).unwrap();
        assert!(content.starts_with("older entries\n"));
        assert!(!content.contains("Go Touch Grass Activity Log"));
        assert!(content.contains("new entry"));
    }

    #[test]
    fn unwritable_target_fails_delivery() {
        let temp = tempfile::tempdir().unwrap();
        let log_file = temp.path().join("gone.txt");
        let output = FileOutput::new(&log_file).unwrap();

        // Replace the log with a directory so opening it for append fails.
        std::fs::remove_file(&log_file).unwrap();
        std::fs::create_dir(&log_file).unwrap();

        assert!(output.deliver("test").is_err());
    }
}
