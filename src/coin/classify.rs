//! Series classification against the bidsmap rules

use std::path::Path;
use tracing::debug;

use super::labels::LabelSet;
use super::SeriesUnit;
use crate::bidsmap::{metadata_reference, Modality, SeriesRule, SourceSection};
use crate::error::CoinError;
use crate::probe::{clean_label, MetadataProbe};

/// Suffix used when neither metadata nor folder name gives one
pub const UNKNOWN_SUFFIX: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub modality: Modality,
    pub labels: LabelSet,
    pub suffix: String,
}

/// A series no rule matched, with where it goes instead
#[derive(Debug)]
pub struct Unmatched {
    pub error: CoinError,
    pub fallback: Classification,
}

/// Classify a series with the first rule whose attributes all match
pub async fn classify(
    series: &SeriesUnit,
    section: &SourceSection,
    probe: &dyn MetadataProbe,
) -> Result<Classification, Unmatched> {
    let file = series.representative.as_deref();

    for (index, rule) in section.series.iter().enumerate() {
        if matches(rule, file, probe).await {
            debug!(
                "{} matches rule #{} ({}/{})",
                series.path.display(),
                index + 1,
                rule.modality,
                rule.suffix
            );
            return Ok(Classification {
                modality: rule.modality,
                labels: labels(rule, file, probe).await,
                suffix: rule.suffix.clone(),
            });
        }
    }

    Err(Unmatched {
        error: CoinError::no_match(&series.path),
        fallback: fallback(series, probe).await,
    })
}

async fn matches(rule: &SeriesRule, file: Option<&Path>, probe: &dyn MetadataProbe) -> bool {
    for (field, patterns) in rule.attribute_patterns() {
        if patterns.is_empty() {
            continue;
        }
        let value = match file {
            Some(file) => probe.field(file, field).await,
            None => String::new(),
        };
        if !patterns.iter().any(|pattern| glob_match(pattern, &value)) {
            return false;
        }
    }
    true
}

fn glob_match(pattern: &str, value: &str) -> bool {
    match glob::Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(value),
        Err(_) => pattern == value,
    }
}

async fn labels(rule: &SeriesRule, file: Option<&Path>, probe: &dyn MetadataProbe) -> LabelSet {
    let mut labels = LabelSet::new();
    for (key, template) in rule.label_templates() {
        let raw = match (metadata_reference(&template), file) {
            (Some(field), Some(file)) => probe.field(file, field).await,
            (Some(_), None) => String::new(),
            (None, _) => template.clone(),
        };
        let value = clean_label(&raw);
        if !value.is_empty() {
            labels.set(key, value);
        }
    }
    labels
}

async fn fallback(series: &SeriesUnit, probe: &dyn MetadataProbe) -> Classification {
    let description = match series.representative.as_deref() {
        Some(file) => clean_label(&probe.field(file, "SeriesDescription").await),
        None => String::new(),
    };

    let mut labels = LabelSet::new();
    if !description.is_empty() {
        labels.set("acq", description);
    }

    let suffix = clean_label(&series.folder_name());
    Classification {
        modality: Modality::ExtraData,
        labels,
        suffix: if suffix.is_empty() {
            UNKNOWN_SUFFIX.to_string()
        } else {
            suffix
        },
    }
}
