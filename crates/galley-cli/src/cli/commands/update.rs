//! `galley update` and the startup check for newer releases.

use anyhow::{Context as _, Result};
use colored::Colorize;
use galley::provision::host::OperatorPrompt;
use galley::release::{self, ReleaseChannel, CHECK_TIMEOUT, DOWNLOAD_TIMEOUT};
use std::ffi::OsString;
use std::fs::{File, Permissions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::Context;
use crate::cli::args::UpdateArgs;
use crate::output;

pub async fn execute(ctx: &Context, args: UpdateArgs) -> Result<()> {
    let download_base = args
        .download_base
        .filter(|base| !base.trim().is_empty())
        .unwrap_or_else(|| ctx.config.download_base.clone());
    install(ctx, &args.version, &download_base).await
}

/// Download `version` and put it in place of the running binary.
async fn install(ctx: &Context, version: &str, download_base: &str) -> Result<()> {
    if ctx.dry_run {
        println!(
            "{} would update galley to {}",
            "Dry run:".yellow().bold(),
            version.cyan()
        );
        return Ok(());
    }

    let target = release::current_target()?;
    let channel = ReleaseChannel::new(download_base, DOWNLOAD_TIMEOUT)?;
    output::note(&format!(
        "Downloading {}",
        channel.binary_url(version, target)
    ));
    let binary = channel
        .download(version, target)
        .await
        .context("cannot download the new galley binary")?;

    let exe = std::env::current_exe().context("cannot locate the running galley binary")?;
    replace_binary(&exe, &binary)?;
    info!(version, path = %exe.display(), "galley updated");

    output::success(&format!("Updated galley to {}", version.cyan()));
    Ok(())
}

/// Offer newer releases from the configured download base, LTS first.
/// Returns true once the binary was replaced; the command should then be
/// run again by the operator. An unreachable channel is not an error.
pub async fn offer_update(ctx: &Context, prompt: &dyn OperatorPrompt) -> bool {
    let releases = match ReleaseChannel::new(&ctx.config.download_base, CHECK_TIMEOUT) {
        Ok(channel) => channel.available().await,
        Err(e) => Err(e),
    };
    let releases = match releases {
        Ok(releases) => releases,
        Err(e) => {
            debug!(error = %e, "update check skipped");
            return false;
        }
    };

    let current = env!("CARGO_PKG_VERSION");
    let offers = releases.offers(current);
    for offer in &offers {
        let question = if offer.lts {
            format!(
                "A new LTS version of galley is available: v{} (current: v{current}). Update now?",
                offer.display_version()
            )
        } else {
            format!(
                "A newer non-LTS version of galley is available: v{}. Update now?",
                offer.display_version()
            )
        };
        if !prompt.confirm(&question, true) {
            continue;
        }

        return match install(ctx, &offer.version, &ctx.config.download_base).await {
            Ok(()) => {
                output::note("Update complete. Please run your command again.");
                true
            }
            Err(err) => {
                output::print_error(&err);
                false
            }
        };
    }

    if !offers.is_empty() {
        output::note("Continuing without update...");
    }
    false
}

/// Write `binary` next to `exe` and rename it into place, so a failed write
/// leaves the running binary untouched.
fn replace_binary(exe: &Path, binary: &[u8]) -> Result<()> {
    let mut staged = OsString::from(exe.as_os_str());
    staged.push(".new");
    let staged = PathBuf::from(staged);

    let written = File::create(&staged)
        .and_then(|mut file| {
            file.write_all(binary)?;
            file.set_permissions(Permissions::from_mode(0o755))?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&staged, exe));

    if let Err(e) = written {
        let _ = std::fs::remove_file(&staged);
        return Err(e).with_context(|| format!("cannot replace {}", exe.display()));
    }
    Ok(())
}
