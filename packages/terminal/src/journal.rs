// ABOUTME: Durable append-only journal of terminal session diagnostics
// ABOUTME: One timestamped line per event; the file is never truncated or rotated

use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for JournalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JournalLevel::Info => "INFO",
            JournalLevel::Warn => "WARN",
            JournalLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

pub struct TerminalJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl TerminalJournal {
    /// Open (or create) the journal for appending
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. Write failures are logged, never returned.
    pub async fn record(&self, level: JournalLevel, workspace_id: &str, message: &str) {
        let line = format_line(level, workspace_id, message);
        let mut file = self.file.lock().await;
        let written = match file.write_all(line.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(
                "Failed to write terminal journal {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn format_line(level: JournalLevel, workspace_id: &str, message: &str) -> String {
    // Keep one event per line
    let message = message.replace(['\r', '\n'], " ");
    format!(
        "{} [{}] {} {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        level,
        workspace_id,
        message
    )
}
