//! Persistence boundary for metrics snapshots.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::monitor::snapshot::Aggregate;
use crate::monitor::types::EnvironmentIssue;

/// The record handed to a [`SnapshotStore`], keyed by session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub session_id: String,
    pub fps: Aggregate,
    pub latency: Aggregate,
    pub confidence: Aggregate,
    pub latency_p95: f32,
    pub issues: Vec<EnvironmentIssue>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only sink for snapshot records.
///
/// Errors are reported to the monitor, which logs and drops them.
pub trait SnapshotStore {
    fn save(&mut self, record: &SnapshotRecord) -> Result<()>;
}

/// In-memory store
impl SnapshotStore for Vec<SnapshotRecord> {
    fn save(&mut self, record: &SnapshotRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// One JSON record per line, appended to a file
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<SnapshotRecord>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("{}: bad record on line {}", path.display(), i + 1))
            })
            .collect()
    }
}

impl SnapshotStore for JsonLinesStore {
    fn save(&mut self, record: &SnapshotRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
