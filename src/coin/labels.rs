//! BIDS label sets and file base names

use std::fmt;

/// Canonical serialization order of label keys; other keys follow in
/// insertion order.
pub const CANONICAL_ORDER: &[&str] = &[
    "task",
    "acq",
    "ce",
    "dir",
    "rec",
    "run",
    "mod",
    "echo",
    "recording",
    "proc",
    "space",
];

/// Key of the run-index label
pub const RUN: &str = "run";

/// Ordered key/value labels with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    entries: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a label, replacing any existing value for the key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in canonical order
    pub fn canonical(&self) -> Vec<(&str, &str)> {
        let mut ordered: Vec<(usize, usize, &str, &str)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(inserted, (k, v))| {
                let rank = CANONICAL_ORDER
                    .iter()
                    .position(|known| known == k)
                    .unwrap_or(CANONICAL_ORDER.len());
                (rank, inserted, k.as_str(), v.as_str())
            })
            .collect();
        ordered.sort();
        ordered.into_iter().map(|(_, _, k, v)| (k, v)).collect()
    }

    /// Equality of the canonical forms with the run label left out
    pub fn eq_ignoring_run(&self, other: &LabelSet) -> bool {
        let strip = |labels: &LabelSet| {
            labels
                .canonical()
                .into_iter()
                .filter(|(k, _)| *k != RUN)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        };
        strip(self) == strip(other)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = LabelSet::new();
        for (k, v) in iter {
            labels.set(k, v);
        }
        labels
    }
}

/// A standardized output base name:
/// `sub-<id>[_ses-<id>]_<key>-<value>..._<suffix>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsName {
    /// Prefixed subject id, e.g. `sub-01`
    pub subject: String,
    /// Prefixed session id, e.g. `ses-01`, or empty
    pub session: String,
    pub labels: LabelSet,
    pub suffix: String,
}

impl BidsName {
    pub fn run(&self) -> Option<u32> {
        self.labels.get(RUN).and_then(|run| run.parse().ok())
    }

    pub fn with_run(mut self, run: u32) -> Self {
        self.labels.set(RUN, run.to_string());
        self
    }

    /// Same subject, session, suffix and labels, whatever the run index
    pub fn eq_ignoring_run(&self, other: &BidsName) -> bool {
        self.subject == other.subject
            && self.session == other.session
            && self.suffix == other.suffix
            && self.labels.eq_ignoring_run(&other.labels)
    }

    /// Parse a file stem back into its parts
    ///
    /// Everything from the first part that is not `key-value` onwards is the
    /// suffix, so converter variants like `bold_e1` never parse as `bold`.
    pub fn parse(stem: &str) -> Option<BidsName> {
        let mut parts = stem.split('_').peekable();

        let subject = parts.next().filter(|p| is_entity(p, "sub"))?.to_string();
        let session = match parts.peek() {
            Some(p) if is_entity(p, "ses") => parts.next().map(str::to_string).unwrap_or_default(),
            _ => String::new(),
        };

        let mut labels = LabelSet::new();
        let mut suffix_parts = Vec::new();
        for part in parts {
            if suffix_parts.is_empty() {
                if let Some((key, value)) = part.split_once('-') {
                    if !key.is_empty() && !value.is_empty() && !labels.contains(key) {
                        labels.set(key, value);
                        continue;
                    }
                }
            }
            suffix_parts.push(part);
        }

        let suffix = suffix_parts.join("_");
        if suffix.is_empty() {
            return None;
        }

        Some(BidsName {
            subject,
            session,
            labels,
            suffix,
        })
    }
}

fn is_entity(part: &str, key: &str) -> bool {
    part.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|value| !value.is_empty())
}

impl fmt::Display for BidsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)?;
        if !self.session.is_empty() {
            write!(f, "_{}", self.session)?;
        }
        for (key, value) in self.labels.canonical() {
            write!(f, "_{}-{}", key, value)?;
        }
        write!(f, "_{}", self.suffix)
    }
}

/// Split a file name into stem and (possibly compound) extension at the
/// first dot: `x_bold.nii.gz` -> (`x_bold`, `.nii.gz`)
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.find('.') {
        Some(index) => file_name.split_at(index),
        None => (file_name, ""),
    }
}
