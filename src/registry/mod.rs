//! Participant registry (`participants.tsv`)
//!
//! The registry is read once at the start of a run, updated after every
//! converted session and written back after every subject. Columns only ever
//! grow: a field seen for the first time becomes a new column and all earlier
//! rows get an empty cell for it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{CoinError, ErrorCode, Result};

/// Registry location relative to the bids folder
pub const REGISTRY_FILE: &str = "participants.tsv";

pub const PARTICIPANT_ID: &str = "participant_id";
pub const SESSION_ID: &str = "session_id";

/// Per-session demographic fields, in first-seen order
///
/// Setting a field twice keeps the last value, so when several acquisition
/// kinds report on the same session the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Personals {
    fields: Vec<(String, String)>,
}

impl Personals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One registry row: column name to cell value, `None` for an empty cell
pub type Row = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ParticipantRegistry {
    /// Read the registry at `path`, or start an empty one when absent
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let mut registry = Self {
            path: path.to_path_buf(),
            columns: vec![PARTICIPANT_ID.to_string()],
            rows: Vec::new(),
        };

        if !path.exists() {
            debug!("No registry at {}, starting empty", path.display());
            return Ok(registry);
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|e| CoinError::from(e).with_context(path.display()))?;

        let headers = reader
            .headers()
            .map_err(|e| CoinError::from(e).with_context(path.display()))?
            .clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Ok(registry);
        }

        registry.columns.clear();
        for header in headers.iter() {
            registry.add_column(header);
        }
        if !registry.columns.iter().any(|c| c == PARTICIPANT_ID) {
            registry.columns.insert(0, PARTICIPANT_ID.to_string());
        }

        for record in reader.records() {
            let record = record.map_err(|e| CoinError::from(e).with_context(path.display()))?;
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .map(|(column, value)| (column.to_string(), cell(value)))
                .collect();
            registry.rows.push(row);
        }

        debug!(
            "Loaded {} registry rows with columns {:?}",
            registry.rows.len(),
            registry.columns
        );
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Participant ids currently in the table
    pub fn participant_ids(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .filter_map(|row| value(row, PARTICIPANT_ID))
            .map(str::to_string)
            .collect()
    }

    /// Upsert one session's fields, returning whether anything changed
    ///
    /// Rows are keyed by (`participant_id`, `session_id`). A session that was
    /// registered before gets its cells updated in place.
    pub fn merge(&mut self, personals: &Personals) -> Result<bool> {
        if personals.is_empty() {
            return Ok(false);
        }

        let participant = personals
            .get(PARTICIPANT_ID)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CoinError::storage_with_code(
                    ErrorCode::STORAGE_SERIALIZATION_ERROR,
                    format!("registry fields without a {}", PARTICIPANT_ID),
                    Some(self.path.clone()),
                )
            })?;
        let session = personals.get(SESSION_ID).unwrap_or("");

        for (key, _) in personals.iter() {
            self.add_column(key);
        }

        let existing = self.rows.iter().position(|row| {
            value(row, PARTICIPANT_ID) == Some(participant)
                && value(row, SESSION_ID).unwrap_or("") == session
        });

        let row = match existing {
            Some(index) => &mut self.rows[index],
            None => {
                self.rows.push(Row::new());
                let index = self.rows.len() - 1;
                &mut self.rows[index]
            }
        };

        let mut changed = existing.is_none();
        for (key, new_value) in personals.iter() {
            let new_value = cell(new_value);
            // An empty value never blanks a filled cell
            if new_value.is_none() && row.get(key).is_some_and(Option::is_some) {
                continue;
            }
            if row.get(key) != Some(&new_value) {
                row.insert(key.to_string(), new_value);
                changed = true;
            }
        }

        Ok(changed)
    }

    /// Write the registry atomically, backfilling empty cells
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error("cannot create folder", e))?;
        }

        let temp_path = self.path.with_extension("tsv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .from_path(&temp_path)
                .map_err(|e| CoinError::from(e).with_context(temp_path.display()))?;

            writer.write_record(&self.columns)?;
            for row in &self.rows {
                writer.write_record(
                    self.columns
                        .iter()
                        .map(|column| value(row, column).unwrap_or("")),
                )?;
            }
            writer
                .flush()
                .map_err(|e| self.io_error("cannot write registry", e))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| self.io_error("cannot replace registry", e))?;

        info!(
            "Saved {} participant rows to {}",
            self.rows.len(),
            self.path.display()
        );
        Ok(())
    }

    fn add_column(&mut self, column: &str) {
        if column.is_empty() || self.columns.iter().any(|c| c == column) {
            return;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.entry(column.to_string()).or_insert(None);
        }
    }

    fn io_error(&self, message: &str, err: std::io::Error) -> CoinError {
        CoinError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            message,
            Some(self.path.clone()),
        )
        .with_source(err)
    }
}

fn cell(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn value<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(|v| v.as_deref())
}
