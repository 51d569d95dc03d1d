//! Output base names and run-index disambiguation

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use super::labels::{split_extension, BidsName, LabelSet, RUN};

/// Build a base name for a new series, starting at run 1 unless the label
/// set already carries a run index.
pub fn compose(subject: &str, session: &str, labels: LabelSet, suffix: &str) -> BidsName {
    let mut labels = labels;
    if !labels.contains(RUN) {
        labels.set(RUN, "1");
    }

    BidsName {
        subject: subject.to_string(),
        session: session.to_string(),
        labels,
        suffix: suffix.to_string(),
    }
}

/// Re-resolve the run index of `name` against the files already in `dir`
///
/// Only reads the directory. When a file with the same name (ignoring run
/// index and extension) exists, the result carries a run index greater than
/// every existing one; otherwise `name` comes back unchanged.
pub fn increment_run_index(dir: &Path, name: BidsName) -> io::Result<BidsName> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(name),
        Err(e) => return Err(e),
    };

    let mut highest: Option<u32> = None;
    for entry in entries {
        let file_name = entry?.file_name();
        let file_name = file_name.to_string_lossy();
        let (stem, _) = split_extension(&file_name);

        let Some(existing) = BidsName::parse(stem) else {
            continue;
        };
        if existing.eq_ignoring_run(&name) {
            let run = existing.run().unwrap_or(1);
            highest = Some(highest.map_or(run, |h| h.max(run)));
        }
    }

    match highest {
        None => Ok(name),
        Some(max) => {
            let requested = name.run().unwrap_or(1);
            let run = requested.max(max + 1);
            debug!("Run index for {} resolved to {}", name, run);
            Ok(name.with_run(run))
        }
    }
}
