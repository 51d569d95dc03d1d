use std::path::{Component, Path};
use tracing::debug;

use super::{SeriesUnit, SessionUnit};
use crate::bidsmap::{IdentifierTemplate, SourceSection};
use crate::error::{CoinError, ErrorCode};
use crate::probe::{clean_label, MetadataProbe};

pub const SUBJECT_PREFIX: &str = "sub-";
pub const SESSION_PREFIX: &str = "ses-";

/// Prefixed subject id and possibly empty prefixed session id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub subject: String,
    pub session: String,
}

impl SessionIdentity {
    /// `sub-<id>[/ses-<id>]` relative output folder
    pub fn relative_dir(&self) -> std::path::PathBuf {
        let mut dir = std::path::PathBuf::from(&self.subject);
        if !self.session.is_empty() {
            dir.push(&self.session);
        }
        dir
    }
}

/// Derive the subject and session identifiers of a session
///
/// Metadata templates (`<Field>`) are read from the representative file of
/// the first series; otherwise the identifiers come from the `sub-*` and
/// `ses-*` components of the session path.
pub async fn resolve_identity(
    session: &SessionUnit,
    series: &[SeriesUnit],
    section: &SourceSection,
    probe: &dyn MetadataProbe,
) -> Result<SessionIdentity, CoinError> {
    let subject = match derive(&section.participant_label, session, series, probe).await? {
        Some(value) => value,
        None => last_component_id(&session.path, SUBJECT_PREFIX),
    };
    if subject.is_empty() {
        return Err(CoinError::identity(
            ErrorCode::IDENTITY_NO_SUBJECT,
            "No valid subject identifier found",
            &session.path,
        ));
    }

    let session_id = match derive(&section.session_label, session, series, probe).await? {
        Some(value) => value,
        None => last_component_id(&session.path, SESSION_PREFIX),
    };

    let identity = SessionIdentity {
        subject: format!("{}{}", SUBJECT_PREFIX, subject),
        session: if session_id.is_empty() {
            String::new()
        } else {
            format!("{}{}", SESSION_PREFIX, session_id)
        },
    };
    debug!(
        "Resolved {} to {:?}",
        session.path.display(),
        identity
    );
    Ok(identity)
}

/// The cleaned metadata value for a `<Field>` template, `None` for folder
/// derivation
async fn derive(
    template: &IdentifierTemplate,
    session: &SessionUnit,
    series: &[SeriesUnit],
    probe: &dyn MetadataProbe,
) -> Result<Option<String>, CoinError> {
    let Some(field) = template.metadata_field() else {
        return Ok(None);
    };

    let file = series
        .first()
        .and_then(|s| s.representative.as_deref())
        .ok_or_else(|| {
            CoinError::identity(
                ErrorCode::IDENTITY_NO_SERIES,
                format!("No raw file to read <{}> from", field),
                &session.path,
            )
        })?;

    Ok(Some(clean_label(&probe.field(file, field).await)))
}

/// Cleaned id of the last path component carrying `prefix`, or empty
fn last_component_id(path: &Path, prefix: &str) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .filter_map(|name| name.strip_prefix(prefix))
        .last()
        .map(clean_label)
        .unwrap_or_default()
}
