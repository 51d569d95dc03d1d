//! Metadata probing of raw acquisition files
//!
//! The engine never parses raw files itself. It asks a [`MetadataProbe`]
//! for individual header fields and for the representative file of a
//! series folder.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod dcmdump;
pub mod layout;

pub use dcmdump::DcmdumpProbe;
pub use layout::{first_file, list_dirs};

#[async_trait]
pub trait MetadataProbe: Send + Sync {
    /// Value of header field `name` in `file`, empty when absent or unreadable
    async fn field(&self, file: &Path, name: &str) -> String;

    /// The raw file used to probe a series folder
    fn representative_file(&self, series: &Path) -> Option<PathBuf> {
        layout::first_file(series)
    }
}

/// Reduce a metadata value to characters allowed inside a BIDS label
pub fn clean_label(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("t1_mprage_sag 1.0mm"), "t1mpragesag10mm");
        assert_eq!(clean_label("P-001"), "P001");
        assert_eq!(clean_label("__"), "");
    }
}
