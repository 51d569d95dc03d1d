//! Testing utilities
//!
//! In-memory stand-ins for the two external collaborators of a run: the
//! metadata probe and the converter executable. Both are public so the
//! integration tests can drive a full [`Coiner`](crate::coin::Coiner) run
//! without DCMTK or dcm2niix installed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::probe::MetadataProbe;
use crate::subprocess::{ExitStatus, ProcessCommand, ProcessError, ProcessOutput, ProcessRunner};

/// Metadata probe answering from a fixed table
///
/// Fields can be keyed by a file or by its series folder; a file lookup
/// falls back to the folder.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    fields: HashMap<PathBuf, HashMap<String, String>>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(
        mut self,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_field(path, name, value);
        self
    }

    pub fn set_field(
        &mut self,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.fields
            .entry(path.into())
            .or_default()
            .insert(name.into(), value.into());
    }

    fn lookup(&self, path: &Path, name: &str) -> Option<&String> {
        self.fields.get(path).and_then(|fields| fields.get(name))
    }
}

#[async_trait]
impl MetadataProbe for StaticProbe {
    async fn field(&self, file: &Path, name: &str) -> String {
        self.lookup(file, name)
            .or_else(|| file.parent().and_then(|dir| self.lookup(dir, name)))
            .cloned()
            .unwrap_or_default()
    }
}

/// Sidecar written by [`FakeConverter`] unless overridden
pub const DEFAULT_SIDECAR: &str = "{\n    \"Modality\": \"MR\",\n    \"ConversionSoftware\": \"dcm2niix\"\n}\n";

/// A converter that writes the files dcm2niix would, keyed by the name of
/// the input series folder
#[derive(Debug, Clone, Default)]
pub struct FakeConverter {
    echoes: HashMap<String, u32>,
    failures: HashMap<String, i32>,
    sidecars: HashMap<String, String>,
    calls: Arc<Mutex<Vec<ProcessCommand>>>,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `_e1` .. `_e<count>` variants for this series instead of one file
    pub fn with_echoes(mut self, series: &str, count: u32) -> Self {
        self.echoes.insert(series.to_string(), count);
        self
    }

    /// Exit with `code` and write nothing for this series
    pub fn failing(mut self, series: &str, code: i32) -> Self {
        self.failures.insert(series.to_string(), code);
        self
    }

    /// Use `content` as the JSON sidecar for this series
    pub fn with_sidecar(mut self, series: &str, content: &str) -> Self {
        self.sidecars.insert(series.to_string(), content.to_string());
        self
    }

    /// Conversions run so far
    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().unwrap().clone()
    }

    fn option_value<'a>(args: &'a [String], flag: &str) -> Result<&'a str, ProcessError> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|index| args.get(index + 1))
            .map(String::as_str)
            .ok_or_else(|| ProcessError::InvalidArguments(format!("missing {}", flag)))
    }

    fn output(status: ExitStatus, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(1),
        }
    }
}

#[async_trait]
impl ProcessRunner for FakeConverter {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        if command.args == ["-v"] {
            return Ok(Self::output(ExitStatus::Success, "dcm2niix v1.0 (fake)\n", ""));
        }

        self.calls.lock().unwrap().push(command.clone());

        let filename = Self::option_value(&command.args, "-f")?;
        let outfolder = Path::new(Self::option_value(&command.args, "-o")?);
        let infolder = command
            .args
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| ProcessError::InvalidArguments("missing input folder".to_string()))?;
        let series = crate::probe::layout::file_name_string(&infolder);

        if let Some(code) = self.failures.get(&series) {
            return Ok(Self::output(
                ExitStatus::Error(*code),
                "",
                &format!("Error: unable to convert {}\n", infolder.display()),
            ));
        }

        let stems: Vec<String> = match self.echoes.get(&series) {
            Some(count) if *count > 0 => (1..=*count)
                .map(|echo| format!("{}_e{}", filename, echo))
                .collect(),
            _ => vec![filename.to_string()],
        };
        let sidecar = self
            .sidecars
            .get(&series)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SIDECAR);

        for stem in &stems {
            fs::write(outfolder.join(format!("{}.json", stem)), sidecar)?;
            fs::write(outfolder.join(format!("{}.nii.gz", stem)), b"\x1f\x8b")?;
        }

        Ok(Self::output(
            ExitStatus::Success,
            &format!(
                "Convert {} DICOM as {}\nConversion required 0.1 seconds\n",
                infolder.display(),
                outfolder.join(filename).display()
            ),
            "",
        ))
    }
}
