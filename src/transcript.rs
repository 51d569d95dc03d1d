//! Append-only audit transcript
//!
//! Every significant action and error of a run is written here and mirrored
//! to `tracing`. The sink is handed to each component explicitly; there is no
//! process-wide log handle.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CoinError;

/// Transcript location relative to the bids folder
pub const TRANSCRIPT_FILE: &str = "code/bidscoiner.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Warn,
    Error,
}

/// File-backed transcript sink
pub struct Transcript {
    path: PathBuf,
    file: File,
}

impl Transcript {
    /// Open (or create) the transcript under `bidsfolder`, never truncating it
    pub fn open(bidsfolder: &Path) -> Result<Self> {
        let path = bidsfolder.join(TRANSCRIPT_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open transcript {}", path.display()))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.write(Level::Warn, message.as_ref());
    }

    /// Record a recoverable engine error with its code and context
    pub fn record_error(&self, err: &CoinError) {
        self.write(
            Level::Error,
            &format!("Error [E{:04}]: {}", err.code(), err.user_message()),
        );
    }

    /// Record an external command line
    pub fn command(&self, command_line: &str) {
        self.write(Level::Info, &format!("$ {}", command_line));
    }

    /// Record captured tool output verbatim, without a timestamp per line
    pub fn output(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        tracing::debug!("{}", text.trim_end());
        let mut block = text.to_string();
        if !block.ends_with('\n') {
            block.push('\n');
        }
        self.append(&block);
    }

    fn write(&self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }

        let line = format!("{} {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        self.append(&line);
    }

    fn append(&self, text: &str) {
        let mut file = &self.file;
        if let Err(e) = file.write_all(text.as_bytes()).and_then(|_| file.flush()) {
            tracing::warn!("Failed to write transcript {}: {}", self.path.display(), e);
        }
    }
}
