//! Subprocess abstraction
//!
//! Both external tools of a run, the converter and the DICOM header dumper,
//! go through a [`ProcessRunner`] so tests can swap in a scripted runner.

pub mod builder;
pub mod converter;
pub mod error;
pub mod mock;
pub mod runner;

#[cfg(test)]
mod tests;

pub use builder::ProcessCommandBuilder;
pub use converter::{ConversionOutcome, ConversionRequest, ConverterRunner, Dcm2niixRunnerImpl};
pub use error::ProcessError;
pub use mock::{MockProcessRunner, MockResponseBuilder};
pub use runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

use std::sync::Arc;

/// Shared runner handed to the converter and the metadata probe
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(runner::TokioProcessRunner))
    }

    #[cfg(test)]
    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        (Self::new(Arc::new(mock.clone())), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Converter runner for `program` on the shared runner
    pub fn converter(&self, program: &str) -> Dcm2niixRunnerImpl {
        Dcm2niixRunnerImpl::new(self.runner(), program)
    }
}
