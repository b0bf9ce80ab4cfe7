//! Fatal error reporting

use tracing::error;

/// Print the error and exit with its status code
///
/// A `CrabError` anywhere in the chain decides the exit code and is shown
/// through its user message; `-v` adds the developer message. Anything else
/// exits with 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    use crate::error::CrabError;

    error!("Fatal error: {:#}", error);

    let exit_code = if let Some(crab_err) = error.downcast_ref::<CrabError>() {
        eprintln!("{}", crab_err.user_message());

        if verbose >= 1 {
            eprintln!("\nContext Chain:\n{}", crab_err.developer_message());
        }

        crab_err.exit_code()
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
