//! Post-processing of converter output
//!
//! Runs over the files the converter wrote for one base name, in this order:
//! placeholder gradient files for diffusion series, `TaskName` injection for
//! functional sidecars, then relabeling of the `_c<i>`, `_e<i>` and `_ph`
//! variants the converter appends for multi-coil, multi-echo and phase data.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::labels::BidsName;
use super::naming::increment_run_index;
use crate::bidsmap::Modality;
use crate::error::{CoinError, ErrorCode};
use crate::transcript::Transcript;

/// Placeholder gradient directions: one zero per axis
pub const PLACEHOLDER_BVEC: &str = "0\n0\n0\n";
/// Placeholder gradient magnitude
pub const PLACEHOLDER_BVAL: &str = "0\n";

const TASK_NAME: &str = "TaskName";
const DEFAULT_INDENT: &str = "    ";

static VARIANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:_c\d+|_e\d+|_ph)+)(\..+)$").expect("valid variant regex"));

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(c|e|ph)(\d*)").expect("valid marker regex"));

/// What the normalizer did for one series
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub placeholders: Vec<PathBuf>,
    pub task_names: Vec<PathBuf>,
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Files left as they were, with the reason
    pub errors: Vec<CoinError>,
}

/// Normalize everything the converter emitted for `name` in `dir`
pub fn normalize(
    dir: &Path,
    name: &BidsName,
    modality: Modality,
    transcript: &Transcript,
) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    let base = name.to_string();

    let sidecars = match emitted_files(dir, &base) {
        Ok(files) => files
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>(),
        Err(e) => {
            report.errors.push(
                CoinError::normalization(
                    ErrorCode::NORMALIZE_GENERIC,
                    "cannot list converter output",
                    dir,
                )
                .with_source(e),
            );
            return report;
        }
    };

    if sidecars.is_empty() {
        if matches!(modality, Modality::Dwi | Modality::Func) {
            report.errors.push(CoinError::normalization(
                ErrorCode::NORMALIZE_MISSING_SIDECAR,
                format!("converter wrote no sidecar for {}", base),
                dir,
            ));
        } else {
            transcript.warn(format!("No sidecar files found for {} in {}", base, dir.display()));
        }
    }

    if modality == Modality::Dwi {
        for sidecar in &sidecars {
            add_gradient_placeholders(sidecar, transcript, &mut report);
        }
    }

    if modality == Modality::Func {
        for sidecar in &sidecars {
            match add_task_name(sidecar, name) {
                Ok(true) => {
                    transcript.info(format!("Adding TaskName to: {}", sidecar.display()));
                    report.task_names.push(sidecar.clone());
                }
                Ok(false) => {}
                Err(e) => report.errors.push(e),
            }
        }
    }

    relabel_variants(dir, name, transcript, &mut report);
    report
}

/// Files in `dir` whose name starts with `base`, sorted
fn emitted_files(dir: &Path, base: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(base) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn add_gradient_placeholders(sidecar: &Path, transcript: &Transcript, report: &mut NormalizeReport) {
    for (extension, content) in [("bvec", PLACEHOLDER_BVEC), ("bval", PLACEHOLDER_BVAL)] {
        let path = sidecar.with_extension(extension);
        if path.exists() {
            continue;
        }
        match fs::write(&path, content) {
            Ok(()) => {
                transcript.info(format!("Adding dummy {} file: {}", extension, path.display()));
                report.placeholders.push(path);
            }
            Err(e) => report.errors.push(
                CoinError::normalization(
                    ErrorCode::NORMALIZE_GENERIC,
                    format!("cannot write placeholder {} file", extension),
                    &path,
                )
                .with_source(e),
            ),
        }
    }
}

/// Inject `TaskName` when missing; `Ok(false)` when already present
fn add_task_name(sidecar: &Path, name: &BidsName) -> Result<bool, CoinError> {
    let content = fs::read_to_string(sidecar).map_err(|e| {
        CoinError::normalization(
            ErrorCode::NORMALIZE_MISSING_SIDECAR,
            "cannot read sidecar",
            sidecar,
        )
        .with_source(e)
    })?;

    let parsed: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        CoinError::normalization(
            ErrorCode::NORMALIZE_INVALID_SIDECAR,
            "sidecar is not valid JSON",
            sidecar,
        )
        .with_source(e)
    })?;
    let Some(object) = parsed.as_object() else {
        return Err(CoinError::normalization(
            ErrorCode::NORMALIZE_INVALID_SIDECAR,
            "sidecar is not a JSON object",
            sidecar,
        ));
    };
    if object.contains_key(TASK_NAME) {
        return Ok(false);
    }

    let task = name.labels.get("task").ok_or_else(|| {
        CoinError::normalization(
            ErrorCode::NORMALIZE_MISSING_TASK_LABEL,
            format!("{} has no task label to take TaskName from", name),
            sidecar,
        )
    })?;

    let updated = insert_member(&content, TASK_NAME, task).ok_or_else(|| {
        CoinError::normalization(
            ErrorCode::NORMALIZE_INVALID_SIDECAR,
            "cannot locate the closing brace",
            sidecar,
        )
    })?;

    fs::write(sidecar, updated).map_err(|e| {
        CoinError::normalization(
            ErrorCode::NORMALIZE_GENERIC,
            "cannot write sidecar",
            sidecar,
        )
        .with_source(e)
    })?;
    Ok(true)
}

/// Insert `"key": "value"` as the last member of the top-level object,
/// keeping every existing byte where it was
pub fn insert_member(content: &str, key: &str, value: &str) -> Option<String> {
    let open = content.find('{')?;
    let close = content.rfind('}')?;
    if close < open {
        return None;
    }

    let body = &content[..close];
    let at = body.trim_end().len();
    let is_empty = at == open + 1;
    let multiline = content[open..close].contains('\n');

    let member = format!(
        "{}: {}",
        serde_json::Value::from(key),
        serde_json::Value::from(value)
    );
    let insertion = match (is_empty, multiline) {
        (true, false) => member,
        (true, true) => format!("\n{}{}", DEFAULT_INDENT, member),
        (false, false) => format!(", {}", member),
        (false, true) => format!(",\n{}{}", member_indent(&content[open + 1..at]), member),
    };

    let mut updated = String::with_capacity(content.len() + insertion.len());
    updated.push_str(&content[..at]);
    updated.push_str(&insertion);
    updated.push_str(&content[at..]);
    Some(updated)
}

/// Leading whitespace of the last member line
fn member_indent(body: &str) -> &str {
    body.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .filter(|indent| !indent.is_empty())
        .unwrap_or(DEFAULT_INDENT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MarkerKind {
    Coil,
    Echo,
    Phase,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Marker {
    kind: MarkerKind,
    index: Option<u32>,
    digits: String,
}

fn parse_markers(markers: &str) -> Vec<Marker> {
    MARKER_RE
        .captures_iter(markers)
        .map(|caps| {
            let kind = match &caps[1] {
                "c" => MarkerKind::Coil,
                "e" => MarkerKind::Echo,
                _ => MarkerKind::Phase,
            };
            let digits = caps[2].to_string();
            Marker {
                kind,
                index: digits.parse().ok(),
                digits,
            }
        })
        .collect()
}

/// Apply the markers of one variant group to the base name's labels
fn relabel(name: &BidsName, markers: &[Marker]) -> BidsName {
    let mut relabeled = name.clone();
    for marker in markers {
        if marker.kind == MarkerKind::Echo
            && !marker.digits.is_empty()
            && !relabeled.labels.contains("echo")
        {
            relabeled.labels.set("echo", marker.digits.clone());
            continue;
        }

        let tag = match marker.kind {
            MarkerKind::Coil => "C",
            MarkerKind::Echo => "E",
            MarkerKind::Phase => "PH",
        };
        let acq = format!(
            "{}{}{}",
            relabeled.labels.get("acq").unwrap_or(""),
            tag,
            marker.digits
        );
        relabeled.labels.set("acq", acq);
    }
    relabeled
}

fn relabel_variants(
    dir: &Path,
    name: &BidsName,
    transcript: &Transcript,
    report: &mut NormalizeReport,
) {
    let base = name.to_string();
    let files = match emitted_files(dir, &base) {
        Ok(files) => files,
        Err(e) => {
            report.errors.push(
                CoinError::normalization(
                    ErrorCode::NORMALIZE_GENERIC,
                    "cannot list converter output",
                    dir,
                )
                .with_source(e),
            );
            return;
        }
    };

    // Marker list -> (file, extension); groups sort by marker kind, then index
    let mut groups: BTreeMap<Vec<Marker>, Vec<(PathBuf, String)>> = BTreeMap::new();
    for file in files {
        let file_name = crate::probe::layout::file_name_string(&file);
        let Some(caps) = VARIANT_RE.captures(&file_name[base.len()..]) else {
            continue;
        };
        let markers = parse_markers(&caps[1]);
        let extension = caps[2].to_string();
        groups.entry(markers).or_default().push((file, extension));
    }

    for (markers, members) in groups {
        let relabeled = relabel(name, &markers);
        let resolved = match increment_run_index(dir, relabeled) {
            Ok(resolved) => resolved,
            Err(e) => {
                report.errors.push(
                    CoinError::normalization(
                        ErrorCode::NORMALIZE_RENAME_FAILED,
                        "cannot resolve run index",
                        dir,
                    )
                    .with_source(e),
                );
                continue;
            }
        };

        let targets: Vec<(PathBuf, PathBuf)> = members
            .into_iter()
            .map(|(file, extension)| {
                let target = dir.join(format!("{}{}", resolved, extension));
                (file, target)
            })
            .collect();

        if let Some((_, taken)) = targets.iter().find(|(_, target)| target.exists()) {
            report.errors.push(CoinError::normalization(
                ErrorCode::NORMALIZE_RENAME_FAILED,
                "target already exists, variant group left as-is",
                taken,
            ));
            continue;
        }

        for (file, target) in targets {
            match fs::rename(&file, &target) {
                Ok(()) => {
                    transcript.info(format!(
                        "Found converter variant, renaming {} -> {}",
                        file.display(),
                        target.display()
                    ));
                    report.renamed.push((file, target));
                }
                Err(e) => report.errors.push(
                    CoinError::normalization(
                        ErrorCode::NORMALIZE_RENAME_FAILED,
                        format!("cannot rename to {}", target.display()),
                        &file,
                    )
                    .with_source(e),
                ),
            }
        }
    }
}
