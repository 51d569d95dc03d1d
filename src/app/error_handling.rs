//! Error handling utilities

use tracing::error;

/// Handle fatal errors and exit with appropriate status code
///
/// A `CoinError` shows its user message, plus the developer message with
/// the source chain when `verbose >= 1`. Anything else prints its context
/// chain and exits with 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    use crate::error::CoinError;

    error!("Fatal error: {:#}", error);

    let exit_code = if let Some(coin_err) = error.downcast_ref::<CoinError>() {
        eprintln!("{}", coin_err.user_message());

        if verbose >= 1 {
            eprintln!("\nContext Chain:\n{}", coin_err.developer_message());
        }

        coin_err.exit_code()
    } else {
        eprintln!("Error: {error}");

        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }

        1
    };

    std::process::exit(exit_code)
}
