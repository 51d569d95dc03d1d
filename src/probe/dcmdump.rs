use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::MetadataProbe;
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};

/// Header dump tool from DCMTK
pub const DCMDUMP: &str = "dcmdump";

type HeaderFields = Arc<HashMap<String, String>>;

/// Probe that reads DICOM headers through `dcmdump`, one dump per file
pub struct DcmdumpProbe {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    cache: Mutex<HashMap<PathBuf, HeaderFields>>,
}

impl DcmdumpProbe {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_program(runner, DCMDUMP)
    }

    pub fn with_program(runner: Arc<dyn ProcessRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn header(&self, file: &Path) -> HeaderFields {
        if let Some(fields) = self.cache.lock().unwrap().get(file) {
            return Arc::clone(fields);
        }

        let command = ProcessCommandBuilder::new(&self.program)
            .arg("-q")
            .path_arg(file)
            .build();

        let fields = match self.runner.run(command).await {
            Ok(output) if output.status.success() => parse_dump(&output.stdout),
            Ok(output) => {
                warn!(
                    "{} failed on {} ({:?}): {}",
                    self.program,
                    file.display(),
                    output.status,
                    output.stderr.trim()
                );
                HashMap::new()
            }
            Err(e) => {
                warn!("Could not run {} on {}: {}", self.program, file.display(), e);
                HashMap::new()
            }
        };

        debug!("Read {} header fields from {}", fields.len(), file.display());
        let fields = Arc::new(fields);
        self.cache
            .lock()
            .unwrap()
            .insert(file.to_path_buf(), Arc::clone(&fields));
        fields
    }
}

#[async_trait]
impl MetadataProbe for DcmdumpProbe {
    async fn field(&self, file: &Path, name: &str) -> String {
        self.header(file).await.get(name).cloned().unwrap_or_default()
    }
}

/// Parse top-level `(gggg,eeee) VR value  # len, vm Name` lines
pub fn parse_dump(dump: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    for line in dump.lines() {
        if !line.starts_with('(') {
            continue;
        }
        let Some((element, comment)) = line.rsplit_once('#') else {
            continue;
        };
        let Some(name) = comment.split_whitespace().last() else {
            continue;
        };

        // "(0010,0020) LO [value]" -> skip tag and VR
        let mut parts = element.splitn(3, char::is_whitespace);
        let _tag = parts.next();
        let _vr = parts.next();
        let raw = parts.next().unwrap_or("").trim();

        let value = if let Some(bracketed) = raw.strip_prefix('[') {
            bracketed.rsplit_once(']').map(|(v, _)| v).unwrap_or(bracketed)
        } else if raw.starts_with("(no value") {
            ""
        } else {
            raw
        };

        fields
            .entry(name.to_string())
            .or_insert_with(|| value.trim().to_string());
    }

    fields
}
