use std::path::Path;
use tracing::info;

use super::labels::BidsName;
use crate::error::CoinError;
use crate::subprocess::{ConversionRequest, ConverterRunner, ExitStatus, ProcessError};
use crate::transcript::Transcript;

/// Convert one series folder into `outfolder` under `name`
///
/// The command line and the converter's combined output go to the
/// transcript whatever the outcome. Anything but a clean exit is returned
/// as a conversion error for the series.
pub async fn convert_series(
    converter: &dyn ConverterRunner,
    transcript: &Transcript,
    options: &str,
    series: &Path,
    name: &BidsName,
    outfolder: &Path,
) -> Result<(), CoinError> {
    let filename = name.to_string();
    let request = ConversionRequest {
        options,
        filename: &filename,
        outfolder,
        infolder: series,
    };

    let outcome = converter
        .convert(&request)
        .await
        .map_err(|e| e.into_conversion_error(series))?;

    transcript.command(&outcome.command_line);
    transcript.output(&outcome.output.combined());

    let failure = match outcome.output.status {
        ExitStatus::Success => None,
        ExitStatus::Error(code) => Some(ProcessError::ExitCode(code)),
        ExitStatus::Signal(signal) => Some(ProcessError::Signal(signal)),
        ExitStatus::Timeout => Some(ProcessError::Timeout(outcome.output.duration)),
    };

    match failure {
        None => {
            info!("Converted {} to {}", series.display(), filename);
            Ok(())
        }
        Some(err) => Err(err.into_conversion_error(series)),
    }
}
