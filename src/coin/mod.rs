//! The session-coining engine
//!
//! A run walks `rawfolder/sub-*/[ses-*/]<series>/` and, for every session,
//! resolves the subject and session identity, classifies each series against
//! the bidsmap, converts it under a collision-free name and normalizes what
//! the converter wrote. The demographic fields found along the way are merged
//! into the participant registry.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::bidsmap::Bidsmap;
use crate::error::CoinError;
use crate::probe::{self, MetadataProbe};
use crate::registry::Personals;
use crate::subprocess::ConverterRunner;
use crate::transcript::Transcript;

pub mod classify;
pub mod dispatch;
pub mod identity;
pub mod kinds;
pub mod labels;
pub mod naming;
pub mod normalize;
pub mod orchestrator;
pub mod plugins;
pub mod state;

pub use classify::{classify, Classification, Unmatched};
pub use identity::{resolve_identity, SessionIdentity};
pub use kinds::DicomCoiner;
pub use labels::{BidsName, LabelSet};
pub use orchestrator::{Coiner, RunOptions, RunSummary, SessionReport};
pub use plugins::{PluginRegistry, SessionCoiner};
pub use state::{SessionState, SkipReason};

/// One raw session folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUnit {
    pub path: PathBuf,
    pub subject_path: PathBuf,
    /// `ses-*` folder name; `None` when the subject folder is the session
    pub session: Option<String>,
}

impl SessionUnit {
    /// The sessions of a subject folder: its `ses-*` subfolders, or the
    /// subject folder itself when there are none
    pub fn discover(subject: &Path) -> Result<Vec<SessionUnit>> {
        let sessions = probe::list_dirs(subject, Some("ses-*"))?;
        if sessions.is_empty() {
            return Ok(vec![SessionUnit {
                path: subject.to_path_buf(),
                subject_path: subject.to_path_buf(),
                session: None,
            }]);
        }

        Ok(sessions
            .into_iter()
            .map(|path| SessionUnit {
                session: Some(probe::layout::file_name_string(&path)),
                subject_path: subject.to_path_buf(),
                path,
            })
            .collect())
    }

    /// Series subfolders in listing order
    pub fn series(&self, probe: &dyn MetadataProbe) -> Result<Vec<SeriesUnit>> {
        Ok(probe::list_dirs(&self.path, None)?
            .into_iter()
            .map(|path| SeriesUnit::new(path, probe))
            .collect())
    }

    /// Where this session lands in the output tree when the folder names are
    /// kept as they are
    pub fn mirrored_path(&self, rawfolder: &Path, bidsfolder: &Path) -> PathBuf {
        match self.path.strip_prefix(rawfolder) {
            Ok(relative) => bidsfolder.join(relative),
            Err(_) => bidsfolder.join(probe::layout::file_name_string(&self.path)),
        }
    }
}

/// One raw series folder with the file used to probe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesUnit {
    pub path: PathBuf,
    pub representative: Option<PathBuf>,
}

impl SeriesUnit {
    pub fn new(path: PathBuf, probe: &dyn MetadataProbe) -> Self {
        let representative = probe.representative_file(&path);
        Self {
            path,
            representative,
        }
    }

    pub fn folder_name(&self) -> String {
        probe::layout::file_name_string(&self.path)
    }
}

/// Everything a coiner needs besides the session itself
pub struct CoinContext<'a> {
    pub bidsmap: &'a Bidsmap,
    pub bidsfolder: &'a Path,
    pub probe: &'a dyn MetadataProbe,
    pub converter: &'a dyn ConverterRunner,
    pub transcript: &'a Transcript,
    pub plugins: &'a PluginRegistry,
}

/// Mutable per-session results shared by the acquisition kinds
#[derive(Debug)]
pub struct SessionWork {
    pub personals: Personals,
    pub state: SessionState,
    /// Recoverable errors hit while coining, in order
    pub errors: Vec<CoinError>,
    /// Base names written, relative to the bids folder
    pub converted: Vec<PathBuf>,
}

impl SessionWork {
    pub fn new() -> Self {
        Self {
            personals: Personals::new(),
            state: SessionState::Pending,
            errors: Vec::new(),
            converted: Vec::new(),
        }
    }

    pub fn enter(&mut self, next: SessionState) {
        if let Err(e) = self.state.advance(next) {
            warn!("{}", e);
        }
    }

    /// Transcribe a recoverable error and keep it for the session report
    pub fn record(&mut self, transcript: &Transcript, err: CoinError) {
        transcript.record_error(&err);
        self.errors.push(err);
    }
}

impl Default for SessionWork {
    fn default() -> Self {
        Self::new()
    }
}
