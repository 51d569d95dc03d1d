use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use bidscoiner::app::{handle_fatal_error, init_logging, AppConfig};
use bidscoiner::bidsmap::DEFAULT_BIDSMAP;
use bidscoiner::{Coiner, RunOptions};

/// Convert raw sub/ses/series acquisition folders into a BIDS dataset
#[derive(Parser)]
#[command(name = "bidscoiner", version)]
#[command(
    about = "Convert raw sub/ses/series acquisition folders into a BIDS dataset",
    after_help = "examples:\n  bidscoiner /project/raw /project/bids\n  bidscoiner -f /project/raw /project/bids -s sub-009 sub-030"
)]
struct Cli {
    /// The source folder containing the raw data in sub-#/ses-#/series format
    rawfolder: PathBuf,

    /// The destination folder with the BIDS data structure
    bidsfolder: PathBuf,

    /// Subject folders (sub-#) to process; all subjects when omitted
    #[arg(short, long, num_args = 1..)]
    subjects: Vec<String>,

    /// Process sessions even when their output folder already exists
    #[arg(short, long)]
    force: bool,

    /// Skip subjects already listed in participants.tsv, also with --force
    #[arg(short, long)]
    participants: bool,

    /// The bidsmap YAML file; relative paths are looked up in <bidsfolder>/code/
    #[arg(short, long, default_value = DEFAULT_BIDSMAP)]
    bidsmap: PathBuf,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AppConfig::new(cli.verbose);
    init_logging(&config);

    let options = RunOptions {
        rawfolder: cli.rawfolder,
        bidsfolder: cli.bidsfolder,
        subjects: cli.subjects,
        force: cli.force,
        participants_protect: cli.participants,
        bidsmap: cli.bidsmap,
    };

    match Coiner::production().run(&options).await {
        Ok(summary) => {
            debug!("Run finished: {:?}", summary);
            println!(
                "Sessions converted: {}, skipped: {}, failed: {}, errors: {}",
                summary.done(),
                summary.skipped(),
                summary.failed(),
                summary.error_count()
            );
        }
        Err(e) => handle_fatal_error(e, config.verbose),
    }
}
