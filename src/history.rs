use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppResult;
use crate::summary::RunSummary;

/// Append-only JSONL log with one line per completed run.
#[derive(Clone, Debug)]
pub struct RunHistory {
    path: PathBuf,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    recorded_at: DateTime<Utc>,
    version: &'static str,
    summary: &'a RunSummary,
}

impl RunHistory {
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, summary: &RunSummary) -> AppResult<()> {
        let mut line = serde_json::to_vec(&HistoryEntry {
            recorded_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
            summary,
        })?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{FailedService, FailureReason};
    use tempfile::tempdir;

    #[test]
    fn appends_one_line_per_run() {
        let dir = tempdir().unwrap();
        let history = RunHistory::open(dir.path().join("runs").join("history.jsonl")).unwrap();

        let first = RunSummary::start().finish();
        let mut second = RunSummary::start();
        second.record_failed(FailedService {
            customer_id: 3,
            customer_name: "Kea Co".into(),
            service_id: 8,
            address: None,
            reason: FailureReason::NoAddressAvailable,
        });
        let second = second.finish();

        history.append(&first).unwrap();
        history.append(&second).unwrap();

        let contents = fs::read_to_string(history.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let decoded: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(decoded["summary"]["skipped"], 1);
        assert_eq!(
            decoded["summary"]["failed_services"][0]["reason"],
            "no_address_available"
        );
    }

    #[test]
    fn keeps_entries_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        RunHistory::open(&path)
            .unwrap()
            .append(&RunSummary::start().finish())
            .unwrap();
        RunHistory::open(&path)
            .unwrap()
            .append(&RunSummary::start().finish())
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
