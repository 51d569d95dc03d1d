use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Bidsmap, SourceKind};
use crate::error::{CoinError, ErrorCode};

/// Default bidsmap file name
pub const DEFAULT_BIDSMAP: &str = "bidsmap.yaml";

/// Environment variable overriding the converter executable
pub const CONVERTER_ENV: &str = "BIDSCOINER_DCM2NIIX";

/// Resolve a bidsmap argument; relative paths live in `<bidsfolder>/code/`
pub fn resolve_bidsmap_path(bidsfolder: &Path, bidsmap: &Path) -> PathBuf {
    if bidsmap.is_absolute() {
        bidsmap.to_path_buf()
    } else {
        bidsfolder.join("code").join(bidsmap)
    }
}

/// Load, validate and apply environment overrides to a bidsmap file
pub fn load_bidsmap(path: &Path) -> Result<Bidsmap, CoinError> {
    if !path.is_file() {
        return Err(CoinError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("bidsmap not found: {}", path.display()),
        ));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        CoinError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("cannot read {}", path.display()),
        )
        .with_source(e)
    })?;

    let mut bidsmap = parse_bidsmap(&content)
        .map_err(|e| e.with_context(path.display()))?;
    apply_env_overrides(&mut bidsmap);

    debug!(
        "Loaded bidsmap {} (enabled: {:?})",
        path.display(),
        bidsmap.enabled_kinds()
    );
    Ok(bidsmap)
}

/// Parse and validate bidsmap YAML
pub fn parse_bidsmap(content: &str) -> Result<Bidsmap, CoinError> {
    let bidsmap: Bidsmap = serde_yaml::from_str(content)?;
    validate(&bidsmap)?;
    Ok(bidsmap)
}

fn validate(bidsmap: &Bidsmap) -> Result<(), CoinError> {
    if bidsmap.enabled_kinds().is_empty() {
        return Err(CoinError::config_with_code(
            ErrorCode::CONFIG_VALIDATION_FAILED,
            "no acquisition kind is enabled",
        ));
    }

    for kind in SourceKind::ALL {
        let Some(section) = bidsmap.section(kind) else {
            continue;
        };
        for (index, rule) in section.series.iter().enumerate() {
            if rule.suffix.trim().is_empty() {
                return Err(CoinError::config_with_code(
                    ErrorCode::CONFIG_VALIDATION_FAILED,
                    format!("{} rule #{} has an empty suffix", kind, index + 1),
                ));
            }
            if rule.suffix.contains(['_', '-', '.', '/']) {
                return Err(CoinError::config_with_code(
                    ErrorCode::CONFIG_VALIDATION_FAILED,
                    format!(
                        "{} rule #{} suffix '{}' must not contain '_', '-', '.' or '/'",
                        kind,
                        index + 1,
                        rule.suffix
                    ),
                ));
            }
        }
    }

    Ok(())
}

fn apply_env_overrides(bidsmap: &mut Bidsmap) {
    if let Ok(program) = std::env::var(CONVERTER_ENV) {
        if !program.trim().is_empty() {
            debug!("Using converter from {}: {}", CONVERTER_ENV, program);
            bidsmap.options.dcm2niix_path = Some(program);
        }
    }
}
