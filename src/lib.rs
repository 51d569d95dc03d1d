//! # bidscoiner
//!
//! Converts a `rawfolder/sub-*/[ses-*/]<series>/` tree of raw acquisitions
//! into a BIDS-organized `bidsfolder`, driven by a declarative bidsmap.
//!
//! ## Usage
//!
//! ```bash
//! bidscoiner /project/raw /project/bids [-s sub-01 sub-02] [-f] [-p] [-b bidsmap.yaml]
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging setup, configuration and fatal error handling
//! - `bidsmap` - Bidsmap types and YAML loader
//! - `coin` - The session-coining engine: identity, classification, naming,
//!   conversion, normalization and the run orchestrator
//! - `error` - Unified error type with numeric codes
//! - `probe` - Metadata probing of raw files and raw tree layout
//! - `registry` - The `participants.tsv` participant registry
//! - `subprocess` - Subprocess abstraction and the converter runner
//! - `transcript` - Append-only run transcript
//! - `testing` - In-memory probe and converter for tests
pub mod app;
pub mod bidsmap;
pub mod coin;
pub mod error;
pub mod probe;
pub mod registry;
pub mod subprocess;
pub mod transcript;

pub mod testing;

pub use coin::{Coiner, RunOptions, RunSummary};
pub use error::{CoinError, ErrorCode};
