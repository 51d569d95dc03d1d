//! Per-acquisition-kind coining
//!
//! DICOM runs the full classify, convert and normalize pipeline. PAR, P7,
//! Nifti and FileSystem have no handler yet and say so. PlugIn hands the
//! session to every configured plugin in turn.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use super::classify::{classify, Unmatched};
use super::dispatch::convert_series;
use super::identity::resolve_identity;
use super::naming::{compose, increment_run_index};
use super::normalize::normalize;
use super::plugins::SessionCoiner;
use super::{CoinContext, SessionState, SessionUnit, SessionWork};
use crate::bidsmap::SourceKind;
use crate::error::{CoinError, ErrorCode};
use crate::registry::{PARTICIPANT_ID, SESSION_ID};

/// Registry column to DICOM header field
pub const DICOM_PERSONALS: [(&str, &str); 4] = [
    ("age", "PatientAge"),
    ("sex", "PatientSex"),
    ("size", "PatientSize"),
    ("weight", "PatientWeight"),
];

impl SourceKind {
    /// Coin `session` for this acquisition kind
    pub async fn coin(
        self,
        ctx: &CoinContext<'_>,
        session: &SessionUnit,
        work: &mut SessionWork,
    ) -> Result<(), CoinError> {
        match self {
            SourceKind::Dicom => DicomCoiner.coin(ctx, session, work).await,
            SourceKind::Par | SourceKind::P7 | SourceKind::Nifti | SourceKind::FileSystem => {
                Err(CoinError::unsupported(format!(
                    "{} data in {}",
                    self,
                    session.path.display()
                )))
            }
            SourceKind::PlugIn => {
                for name in ctx.bidsmap.plugin_names() {
                    let Some(plugin) = ctx.plugins.get(name) else {
                        work.record(
                            ctx.transcript,
                            CoinError::config_with_code(
                                ErrorCode::CONFIG_UNKNOWN_PLUGIN,
                                format!("plugin '{}' is not registered", name),
                            ),
                        );
                        continue;
                    };

                    ctx.transcript
                        .info(format!("Running plugin {} on {}", name, session.path.display()));
                    if let Err(e) = plugin.coin(ctx, session, work).await {
                        if !e.is_recoverable() {
                            return Err(e);
                        }
                        work.record(ctx.transcript, e);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Converts every series folder of a session with the external converter
pub struct DicomCoiner;

#[async_trait]
impl SessionCoiner for DicomCoiner {
    fn name(&self) -> &str {
        "dicom"
    }

    async fn coin(
        &self,
        ctx: &CoinContext<'_>,
        session: &SessionUnit,
        work: &mut SessionWork,
    ) -> Result<(), CoinError> {
        let Some(section) = ctx.bidsmap.section(SourceKind::Dicom) else {
            return Ok(());
        };

        let series = session.series(ctx.probe).map_err(|e| {
            CoinError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                format!("{:#}", e),
                Some(session.path.clone()),
            )
        })?;

        // Nothing is written before the identity is known
        let identity = resolve_identity(session, &series, section, ctx.probe).await?;
        let session_dir = ctx.bidsfolder.join(identity.relative_dir());
        create_dir(&session_dir)?;

        let mut last_file: Option<PathBuf> = None;
        for unit in &series {
            ctx.transcript
                .info(format!("Processing dicom-folder: {}", unit.path.display()));

            let Some(file) = unit.representative.as_deref() else {
                ctx.transcript
                    .warn(format!("No raw files in {}, skipping", unit.path.display()));
                continue;
            };
            last_file = Some(file.to_path_buf());
            work.enter(SessionState::Converting);

            let classification = match classify(unit, section, ctx.probe).await {
                Ok(classification) => classification,
                Err(Unmatched { error, fallback }) => {
                    work.record(ctx.transcript, error);
                    fallback
                }
            };

            let modality = classification.modality;
            let outdir = session_dir.join(modality.as_str());
            create_dir(&outdir)?;

            let name = compose(
                &identity.subject,
                &identity.session,
                classification.labels,
                &classification.suffix,
            );
            let name = increment_run_index(&outdir, name).map_err(|e| {
                CoinError::storage_with_code(
                    ErrorCode::STORAGE_IO_ERROR,
                    "cannot scan output folder",
                    Some(outdir.clone()),
                )
                .with_source(e)
            })?;

            if let Err(e) = convert_series(
                ctx.converter,
                ctx.transcript,
                &ctx.bidsmap.options.dcm2niix,
                &unit.path,
                &name,
                &outdir,
            )
            .await
            {
                work.record(ctx.transcript, e);
                continue;
            }

            work.enter(SessionState::Normalizing);
            let report = normalize(&outdir, &name, modality, ctx.transcript);
            for err in report.errors {
                work.record(ctx.transcript, err);
            }

            work.converted.push(
                identity
                    .relative_dir()
                    .join(modality.as_str())
                    .join(name.to_string()),
            );
        }

        work.personals.set(PARTICIPANT_ID, identity.subject.as_str());
        if !identity.session.is_empty() {
            work.personals.set(SESSION_ID, identity.session.as_str());
        }
        if let Some(file) = last_file {
            for (column, field) in DICOM_PERSONALS {
                work.personals.set(column, ctx.probe.field(&file, field).await);
            }
        }

        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<(), CoinError> {
    fs::create_dir_all(dir).map_err(|e| {
        CoinError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            "cannot create output folder",
            Some(dir.to_path_buf()),
        )
        .with_source(e)
    })
}
