//! Per-session lifecycle

use anyhow::{anyhow, Result};
use std::fmt;

/// Why a session was not converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The mirrored output folder already exists and force is off
    AlreadyConverted,
    /// The subject is already in the registry and protection is on
    RegistryProtected,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyConverted => f.write_str("already converted"),
            SkipReason::RegistryProtected => f.write_str("participant already registered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Converting,
    Normalizing,
    Registering,
    Done,
    Skipped(SkipReason),
    FailedPartial,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Done | SessionState::Skipped(_) | SessionState::FailedPartial
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(&mut self, next: SessionState) -> Result<()> {
        validate_transition(self, &next)?;
        *self = next;
        Ok(())
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Pending => f.write_str("pending"),
            SessionState::Converting => f.write_str("converting"),
            SessionState::Normalizing => f.write_str("normalizing"),
            SessionState::Registering => f.write_str("registering"),
            SessionState::Done => f.write_str("done"),
            SessionState::Skipped(reason) => write!(f, "skipped ({})", reason),
            SessionState::FailedPartial => f.write_str("failed"),
        }
    }
}

/// Validate a state transition
pub fn validate_transition(from: &SessionState, to: &SessionState) -> Result<()> {
    use SessionState::*;

    match (from, to) {
        (Pending, Converting) => Ok(()),
        (Pending, Skipped(_)) => Ok(()),
        (Pending, FailedPartial) => Ok(()),
        // Converter and normalizer alternate per series
        (Converting, Normalizing) => Ok(()),
        (Normalizing, Converting) => Ok(()),
        (Converting | Normalizing, Registering) => Ok(()),
        (Converting | Normalizing, FailedPartial) => Ok(()),
        (Registering, Done) => Ok(()),
        (a, b) if a == b && !a.is_terminal() => Ok(()),
        _ => Err(anyhow!(
            "Invalid session transition from {:?} to {:?}",
            from,
            to
        )),
    }
}
