//! galley - Galley node agent
//!
//! Prepares Linux hosts and joins them to Galley-managed k0s clusters.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match galley_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            galley_cli::output::print_error(&err);
            ExitCode::FAILURE
        }
    }
}
