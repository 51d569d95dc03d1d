use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::plugins::PluginRegistry;
use super::state::{SessionState, SkipReason};
use super::{resolve_identity, CoinContext, SessionIdentity, SessionUnit, SessionWork};
use crate::bidsmap::{load_bidsmap, resolve_bidsmap_path, Modality, SourceKind};
use crate::error::CoinError;
use crate::probe::{self, DcmdumpProbe, MetadataProbe};
use crate::registry::{ParticipantRegistry, REGISTRY_FILE};
use crate::subprocess::{ConverterRunner, ProcessRunner, SubprocessManager};
use crate::transcript::Transcript;

/// Marker file keeping the fallback folder out of validation
pub const BIDSIGNORE_FILE: &str = ".bidsignore";

/// Arguments of one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub rawfolder: PathBuf,
    pub bidsfolder: PathBuf,
    /// `sub-*` folder names to process; all subjects when empty
    pub subjects: Vec<String>,
    /// Reconvert sessions whose output folder already exists
    pub force: bool,
    /// Leave subjects that are already in the registry alone, even with force
    pub participants_protect: bool,
    /// Bidsmap file, relative paths resolve against `<bidsfolder>/code`
    pub bidsmap: PathBuf,
}

/// Outcome of one session
#[derive(Debug)]
pub struct SessionReport {
    pub session: PathBuf,
    pub state: SessionState,
    pub errors: Vec<CoinError>,
    pub converted: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub sessions: Vec<SessionReport>,
}

impl RunSummary {
    pub fn done(&self) -> usize {
        self.count(|state| *state == SessionState::Done)
    }

    pub fn skipped(&self) -> usize {
        self.count(|state| matches!(state, SessionState::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|state| *state == SessionState::FailedPartial)
    }

    pub fn error_count(&self) -> usize {
        self.sessions.iter().map(|s| s.errors.len()).sum()
    }

    fn count(&self, predicate: impl Fn(&SessionState) -> bool) -> usize {
        self.sessions.iter().filter(|s| predicate(&s.state)).count()
    }
}

/// Drives a run: subjects, then sessions, then acquisition kinds
pub struct Coiner {
    subprocess: SubprocessManager,
    probe: Arc<dyn MetadataProbe>,
    plugins: PluginRegistry,
}

impl Coiner {
    pub fn new(runner: Arc<dyn ProcessRunner>, probe: Arc<dyn MetadataProbe>) -> Self {
        Self {
            subprocess: SubprocessManager::new(runner),
            probe,
            plugins: PluginRegistry::new(),
        }
    }

    /// Real subprocesses: dcm2niix for conversion, dcmdump for metadata
    pub fn production() -> Self {
        let subprocess = SubprocessManager::production();
        let probe = Arc::new(DcmdumpProbe::new(subprocess.runner()));
        Self::new(subprocess.runner(), probe)
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let rawfolder = options.rawfolder.canonicalize().with_context(|| {
            format!("Raw folder {} does not exist", options.rawfolder.display())
        })?;
        fs::create_dir_all(options.bidsfolder.join("code")).with_context(|| {
            format!("Failed to create bids folder {}", options.bidsfolder.display())
        })?;
        let bidsfolder = options.bidsfolder.canonicalize().with_context(|| {
            format!("Failed to resolve bids folder {}", options.bidsfolder.display())
        })?;
        write_bidsignore(&bidsfolder)?;

        let transcript = Transcript::open(&bidsfolder)?;
        transcript.info("------------ START ------------");
        transcript.info(format!(
            ">>> bidscoiner rawfolder={} bidsfolder={} subjects={:?} force={} participants={} bidsmap={}",
            rawfolder.display(),
            bidsfolder.display(),
            options.subjects,
            options.force,
            options.participants_protect,
            options.bidsmap.display()
        ));

        let bidsmap_path = resolve_bidsmap_path(&bidsfolder, &options.bidsmap);
        let bidsmap = match load_bidsmap(&bidsmap_path) {
            Ok(bidsmap) => bidsmap,
            Err(e) => {
                transcript.record_error(&e);
                return Err(e.into());
            }
        };

        let mut registry = ParticipantRegistry::load_or_create(&bidsfolder.join(REGISTRY_FILE))?;

        let converter = self
            .subprocess
            .converter(bidsmap.converter_program())
            .with_timeout(bidsmap.converter_timeout());
        if bidsmap.is_enabled(SourceKind::Dicom) {
            match converter.check_availability().await {
                Ok(true) => debug!("Converter {} is available", bidsmap.converter_program()),
                Ok(false) => transcript.warn(format!(
                    "Converter {} not found, every series will fail",
                    bidsmap.converter_program()
                )),
                Err(e) => transcript.warn(format!(
                    "Could not check converter {}: {}",
                    bidsmap.converter_program(),
                    e
                )),
            }
        }

        let ctx = CoinContext {
            bidsmap: &bidsmap,
            bidsfolder: &bidsfolder,
            probe: self.probe.as_ref(),
            converter: &converter,
            transcript: &transcript,
            plugins: &self.plugins,
        };

        // Only rows present before this run protect a participant
        let protected = if options.participants_protect {
            registry.participant_ids()
        } else {
            BTreeSet::new()
        };

        let mut summary = RunSummary::default();
        for subject in select_subjects(&rawfolder, &options.subjects)? {
            let sessions = SessionUnit::discover(&subject)?;
            let subject_name = probe::layout::file_name_string(&subject);

            for session in sessions {
                let identity = planned_identity(&ctx, &session).await;
                let participant = identity
                    .as_ref()
                    .map_or(subject_name.as_str(), |identity| identity.subject.as_str());

                if protected.contains(participant) {
                    transcript.info(format!(
                        "Skipping {}: {} already in {}",
                        session.path.display(),
                        participant,
                        REGISTRY_FILE
                    ));
                    summary.sessions.push(skipped(&session, SkipReason::RegistryProtected));
                    continue;
                }

                let target = match &identity {
                    Some(identity) => bidsfolder.join(identity.relative_dir()),
                    None => session.mirrored_path(&rawfolder, &bidsfolder),
                };
                if !options.force && target.is_dir() {
                    transcript.info(format!(
                        "Skipping {}: {} already converted",
                        session.path.display(),
                        target.display()
                    ));
                    summary.sessions.push(skipped(&session, SkipReason::AlreadyConverted));
                    continue;
                }

                let report = self.coin_session(&ctx, &session, &mut registry).await?;
                summary.sessions.push(report);
            }

            registry
                .save()
                .with_context(|| format!("Failed to save registry after {}", subject_name))?;
        }

        transcript.info(format!(
            "Sessions done: {}, skipped: {}, failed: {}, errors: {}",
            summary.done(),
            summary.skipped(),
            summary.failed(),
            summary.error_count()
        ));
        transcript.info("------------ FINISHED! ------------");
        Ok(summary)
    }

    async fn coin_session(
        &self,
        ctx: &CoinContext<'_>,
        session: &SessionUnit,
        registry: &mut ParticipantRegistry,
    ) -> Result<SessionReport> {
        ctx.transcript
            .info(format!("Coining session: {}", session.path.display()));

        let mut work = SessionWork::new();
        work.enter(SessionState::Converting);

        for kind in ctx.bidsmap.enabled_kinds() {
            match kind.coin(ctx, session, &mut work).await {
                Ok(()) => {}
                Err(e @ CoinError::Identity { .. }) => {
                    work.record(ctx.transcript, e);
                    work.enter(SessionState::FailedPartial);
                    break;
                }
                Err(e) if !e.is_recoverable() => {
                    ctx.transcript.record_error(&e);
                    return Err(e.into());
                }
                Err(e) => work.record(ctx.transcript, e),
            }
        }

        if work.state != SessionState::FailedPartial {
            work.enter(SessionState::Registering);
            match registry.merge(&work.personals) {
                Ok(true) => debug!("Registered {:?}", work.personals),
                Ok(false) => {}
                Err(e) => work.record(ctx.transcript, e),
            }
            work.enter(SessionState::Done);
        }

        info!(
            "Session {} {} with {} error(s)",
            session.path.display(),
            work.state,
            work.errors.len()
        );
        Ok(SessionReport {
            session: session.path.clone(),
            state: work.state,
            errors: work.errors,
            converted: work.converted,
        })
    }
}

fn skipped(session: &SessionUnit, reason: SkipReason) -> SessionReport {
    let mut state = SessionState::Pending;
    // Pending -> Skipped is always allowed
    let _ = state.advance(SessionState::Skipped(reason));
    SessionReport {
        session: session.path.clone(),
        state,
        errors: Vec::new(),
        converted: Vec::new(),
    }
}

/// Identity the DICOM pass would give this session, if it can be read
async fn planned_identity(
    ctx: &CoinContext<'_>,
    session: &SessionUnit,
) -> Option<SessionIdentity> {
    let section = ctx.bidsmap.section(SourceKind::Dicom)?;
    let series = session.series(ctx.probe).ok()?;
    match resolve_identity(session, &series, section, ctx.probe).await {
        Ok(identity) => Some(identity),
        Err(e) => {
            debug!("No identity for {}: {}", session.path.display(), e);
            None
        }
    }
}

/// The subject folders of a run: the named ones that exist, or every
/// `sub-*` folder
fn select_subjects(rawfolder: &Path, subjects: &[String]) -> Result<Vec<PathBuf>> {
    if subjects.is_empty() {
        return probe::list_dirs(rawfolder, Some("sub-*"));
    }

    Ok(subjects
        .iter()
        .map(|name| rawfolder.join(name))
        .filter(|path| {
            let exists = path.is_dir();
            if !exists {
                debug!("Ignoring unknown subject {}", path.display());
            }
            exists
        })
        .collect())
}

fn write_bidsignore(bidsfolder: &Path) -> Result<()> {
    let path = bidsfolder.join(BIDSIGNORE_FILE);
    if !path.exists() {
        fs::write(&path, format!("{}/\n", Modality::ExtraData))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
