//! Error handling utilities

use tracing::error;

use crate::storage::StorageError;

/// Exit code for invalid configuration
pub const CONFIG_ERROR: i32 = 2;
/// Exit code for every other failure
pub const GENERAL_ERROR: i32 = 1;

/// Exit status for a fatal error
///
/// Configuration problems anywhere in the chain map to [`CONFIG_ERROR`].
pub fn exit_code(error: &anyhow::Error) -> i32 {
    let is_config = error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StorageError>(),
            Some(StorageError::Configuration(_))
        )
    });
    if is_config {
        CONFIG_ERROR
    } else {
        GENERAL_ERROR
    }
}

/// Handle fatal errors and exit with appropriate status code
///
/// The full cause chain is printed with `-v` and above.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code(&error))
}
