use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::builder::ProcessCommandBuilder;
use super::error::ProcessError;
use super::runner::{ProcessCommand, ProcessOutput, ProcessRunner};

/// Default converter executable
pub const DCM2NIIX: &str = "dcm2niix";

/// One invocation of the converter for a single series
#[derive(Debug, Clone)]
pub struct ConversionRequest<'a> {
    /// Free-form options from the bidsmap, split like a shell would
    pub options: &'a str,
    /// Output base name (without extension)
    pub filename: &'a str,
    pub outfolder: &'a Path,
    pub infolder: &'a Path,
}

/// What the converter did, whether or not it succeeded
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub command_line: String,
    pub output: ProcessOutput,
}

#[async_trait]
pub trait ConverterRunner: Send + Sync {
    async fn check_availability(&self) -> Result<bool, ProcessError>;
    async fn convert(
        &self,
        request: &ConversionRequest<'_>,
    ) -> Result<ConversionOutcome, ProcessError>;
}

pub struct Dcm2niixRunnerImpl {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    timeout: Option<Duration>,
}

impl Dcm2niixRunnerImpl {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill a conversion that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the `<program> <options> -f <name> -o <out> <in>` command
    pub fn build_command(&self, request: &ConversionRequest<'_>) -> Result<ProcessCommand, ProcessError> {
        Ok(ProcessCommandBuilder::new(&self.program)
            .options(request.options)?
            .arg("-f")
            .arg(request.filename)
            .arg("-o")
            .path_arg(request.outfolder)
            .path_arg(request.infolder)
            .timeout(self.timeout)
            .build())
    }
}

#[async_trait]
impl ConverterRunner for Dcm2niixRunnerImpl {
    async fn check_availability(&self) -> Result<bool, ProcessError> {
        let result = self
            .runner
            .run(ProcessCommandBuilder::new(&self.program).arg("-v").build())
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(ProcessError::CommandNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn convert(
        &self,
        request: &ConversionRequest<'_>,
    ) -> Result<ConversionOutcome, ProcessError> {
        let command = self.build_command(request)?;
        let command_line = command.display_line();
        let output = self.runner.run(command).await?;

        Ok(ConversionOutcome {
            command_line,
            output,
        })
    }
}
