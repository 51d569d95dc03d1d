//! Declarative mapping table ("bidsmap")
//!
//! The bidsmap tells the coiner which acquisition kinds to process, how to
//! derive subject and session identifiers, which converter options to use and
//! how each raw series maps onto a BIDS modality, label set and suffix.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod loader;

pub use loader::{load_bidsmap, resolve_bidsmap_path, DEFAULT_BIDSMAP};

/// Standardized modality folder a series is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Anat,
    Func,
    Dwi,
    Fmap,
    Beh,
    Pet,
    /// Fallback for series that no rule matches
    ExtraData,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Anat => "anat",
            Modality::Func => "func",
            Modality::Dwi => "dwi",
            Modality::Fmap => "fmap",
            Modality::Beh => "beh",
            Modality::Pet => "pet",
            Modality::ExtraData => "extra_data",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of acquisition kinds a bidsmap can enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Dicom,
    Par,
    P7,
    Nifti,
    FileSystem,
    PlugIn,
}

impl SourceKind {
    /// Processing order within a session
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Dicom,
        SourceKind::Par,
        SourceKind::P7,
        SourceKind::Nifti,
        SourceKind::FileSystem,
        SourceKind::PlugIn,
    ];

    /// Section name in the bidsmap document
    pub fn section_name(&self) -> &'static str {
        match self {
            SourceKind::Dicom => "DICOM",
            SourceKind::Par => "PAR",
            SourceKind::P7 => "P7",
            SourceKind::Nifti => "Nifti",
            SourceKind::FileSystem => "FileSystem",
            SourceKind::PlugIn => "PlugIn",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_name())
    }
}

/// Subject or session identifier template
///
/// `<Field>` derives the identifier from metadata field `Field`; anything
/// else (including an absent template) derives it from the folder names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierTemplate(pub Option<String>);

impl IdentifierTemplate {
    pub fn from_field(field: &str) -> Self {
        Self(Some(format!("<{}>", field)))
    }

    /// The metadata field this template derives from, if any
    pub fn metadata_field(&self) -> Option<&str> {
        self.0.as_deref().and_then(metadata_reference)
    }
}

/// Extract `Field` from a `<Field>` reference
pub fn metadata_reference(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('<')?.strip_suffix('>')?;
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    /// Options string passed to the converter before `-f`/`-o`
    #[serde(default)]
    pub dcm2niix: String,

    /// Converter executable, `dcm2niix` on the PATH when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dcm2niix_path: Option<String>,

    /// Seconds a single conversion may take; unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dcm2niix_timeout: Option<u64>,
}

/// One mapping rule: attribute patterns to modality, labels and suffix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRule {
    pub modality: Modality,

    /// Metadata field to glob pattern (or list of alternatives); all must match
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_yaml::Value>,

    /// Label key to value; `<Field>` values are read from metadata
    #[serde(default)]
    pub labels: BTreeMap<String, serde_yaml::Value>,

    pub suffix: String,
}

impl SeriesRule {
    /// Alternative glob patterns for each attribute
    pub fn attribute_patterns(&self) -> Vec<(&str, Vec<String>)> {
        self.attributes
            .iter()
            .map(|(field, value)| {
                let patterns = match value {
                    serde_yaml::Value::Sequence(items) => {
                        items.iter().filter_map(scalar_to_string).collect()
                    }
                    other => scalar_to_string(other).into_iter().collect(),
                };
                (field.as_str(), patterns)
            })
            .collect()
    }

    /// Label templates with null values dropped
    pub fn label_templates(&self) -> Vec<(&str, String)> {
        self.labels
            .iter()
            .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.as_str(), v)))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Per-acquisition-kind section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSection {
    #[serde(default)]
    pub participant_label: IdentifierTemplate,

    #[serde(default)]
    pub session_label: IdentifierTemplate,

    /// Ordered rules; the first match wins
    #[serde(default)]
    pub series: Vec<SeriesRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bidsmap {
    #[serde(rename = "Options", default)]
    pub options: Options,

    #[serde(rename = "DICOM", default)]
    pub dicom: Option<SourceSection>,

    #[serde(rename = "PAR", default)]
    pub par: Option<SourceSection>,

    #[serde(rename = "P7", default)]
    pub p7: Option<SourceSection>,

    #[serde(rename = "Nifti", default)]
    pub nifti: Option<SourceSection>,

    #[serde(rename = "FileSystem", default)]
    pub filesystem: Option<SourceSection>,

    #[serde(rename = "PlugIn", default)]
    pub plugins: Option<Vec<String>>,
}

impl Bidsmap {
    /// The section for a kind, `None` when disabled
    pub fn section(&self, kind: SourceKind) -> Option<&SourceSection> {
        match kind {
            SourceKind::Dicom => self.dicom.as_ref(),
            SourceKind::Par => self.par.as_ref(),
            SourceKind::P7 => self.p7.as_ref(),
            SourceKind::Nifti => self.nifti.as_ref(),
            SourceKind::FileSystem => self.filesystem.as_ref(),
            SourceKind::PlugIn => None,
        }
    }

    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::PlugIn => self.plugin_names().next().is_some(),
            other => self.section(other).is_some(),
        }
    }

    /// Enabled kinds in processing order
    pub fn enabled_kinds(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }

    pub fn converter_timeout(&self) -> Option<std::time::Duration> {
        self.options
            .dcm2niix_timeout
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }

    pub fn converter_program(&self) -> &str {
        self.options
            .dcm2niix_path
            .as_deref()
            .unwrap_or(crate::subprocess::converter::DCM2NIIX)
    }
}
