//! Common test utilities and helpers

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use bidscoiner::coin::PluginRegistry;
use bidscoiner::testing::{FakeConverter, StaticProbe};
use bidscoiner::{Coiner, RunOptions};

/// Bidsmap covering anat, func, dwi and an unmatched fallback
pub const BIDSMAP: &str = r#"
Options:
  dcm2niix: -b y -z y
DICOM:
  participant_label: ~
  session_label: ~
  series:
    - modality: anat
      attributes:
        SeriesDescription: '*t1*'
      suffix: T1w
    - modality: func
      attributes:
        SeriesDescription: '*rest*'
      labels:
        task: rest
      suffix: bold
    - modality: dwi
      attributes:
        SeriesDescription: ['*dwi*', '*DTI*']
      suffix: dwi
"#;

/// A raw/bids folder pair in a temporary directory
pub struct Study {
    _temp_dir: TempDir,
    pub raw: PathBuf,
    pub bids: PathBuf,
    pub probe: StaticProbe,
}

impl Study {
    pub fn new(bidsmap: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let raw = root.join("raw");
        let bids = root.join("bids");
        fs::create_dir_all(&raw).unwrap();
        fs::create_dir_all(bids.join("code")).unwrap();
        fs::write(bids.join("code").join("bidsmap.yaml"), bidsmap).unwrap();

        Self {
            _temp_dir: temp_dir,
            raw,
            bids,
            probe: StaticProbe::new(),
        }
    }

    /// Create `raw/<relative>/IM_0001` and register its header fields
    pub fn add_series(&mut self, relative: &str, fields: &[(&str, &str)]) -> PathBuf {
        let series = self.raw.join(relative);
        fs::create_dir_all(&series).unwrap();
        fs::write(series.join("IM_0001"), "DICM").unwrap();
        for (name, value) in fields {
            self.probe.set_field(&series, *name, *value);
        }
        series
    }

    pub fn options(&self) -> RunOptions {
        RunOptions {
            rawfolder: self.raw.clone(),
            bidsfolder: self.bids.clone(),
            subjects: Vec::new(),
            force: false,
            participants_protect: false,
            bidsmap: PathBuf::from("bidsmap.yaml"),
        }
    }

    pub fn coiner(&self, converter: &FakeConverter) -> Coiner {
        Coiner::new(Arc::new(converter.clone()), Arc::new(self.probe.clone()))
    }

    pub fn coiner_with_plugins(&self, converter: &FakeConverter, plugins: PluginRegistry) -> Coiner {
        self.coiner(converter).with_plugins(plugins)
    }

    /// Sorted file names in `bids/<relative>`, empty when the folder is absent
    pub fn files(&self, relative: &str) -> Vec<String> {
        let dir = self.bids.join(relative);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Every file under the bids folder except `code/`, relative and sorted
    pub fn outputs(&self) -> Vec<String> {
        let mut found = Vec::new();
        collect(&self.bids, &self.bids, &mut found);
        found.retain(|path| !path.starts_with("code/"));
        found.sort();
        found
    }

    pub fn registry(&self) -> String {
        fs::read_to_string(self.bids.join("participants.tsv")).unwrap_or_default()
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.bids.join(relative)).unwrap()
    }

    pub fn transcript(&self) -> String {
        self.read("code/bidscoiner.log")
    }
}

fn collect(root: &Path, dir: &Path, found: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, found);
        } else {
            found.push(path.strip_prefix(root).unwrap().to_string_lossy().into_owned());
        }
    }
}
