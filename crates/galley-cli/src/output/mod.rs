//! Terminal output helpers.

use colored::Colorize;
use galley::provision::{ProvisionError, WorkerInvite};

/// Print a success line.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a dimmed note.
pub fn note(message: &str) {
    println!("{}", message.dimmed());
}

/// Print an error with its cause chain and any remediation hint.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }
    if let Some(hint) = hint(err) {
        eprintln!();
        eprintln!("{} {}", "Hint:".yellow().bold(), hint);
    }
}

/// First remediation hint carried anywhere in the chain.
#[must_use]
pub fn hint(err: &anyhow::Error) -> Option<&str> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ProvisionError>())
        .find_map(ProvisionError::hint)
}

/// Instructions for bringing up a worker with `invite`.
#[must_use]
pub fn handoff(invite: &WorkerInvite, download_base: &str) -> String {
    format!(
        "To add a worker node, run on the new host:\n\n  \
         1. Install the Galley CLI:\n       \
            curl -sSf {download_base} | sudo sh\n  \
         2. Prepare the host:\n       \
            sudo galley node prepare\n  \
         3. Join the cluster:\n       \
            sudo galley worker join {token}\n\n\
         The join token expires in {expiry}. Run `galley worker invite` on this controller for a new one.",
        token = invite.token,
        expiry = invite.expiry,
    )
}

/// Print the worker hand-off block.
pub fn print_handoff(invite: &WorkerInvite, download_base: &str) {
    println!();
    println!("{}", "Worker join token".bold().underline());
    println!();
    println!("{}", handoff(invite, download_base));
}
