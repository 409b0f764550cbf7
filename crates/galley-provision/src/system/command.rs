use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ProvisionError;

const EDITORS: [&str; 3] = ["nano", "vi", "vim"];

/// Runs host commands
#[derive(Debug, Clone, Copy, Default)]
pub struct Runner;

impl Runner {
    /// Run `program` with the terminal attached; fails on a non-zero exit
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<(), ProvisionError> {
        let line = command_line(program, args);
        info!(command = %line, "running");

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| command_error(&line, e.to_string()))?;
        check(&line, status)
    }

    /// Run `program` and capture its stdout; fails on a non-zero exit
    pub async fn output(&self, program: &str, args: &[&str]) -> Result<String, ProvisionError> {
        let line = command_line(program, args);
        debug!(command = %line, "capturing output");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| command_error(&line, e.to_string()))?;
        check(&line, output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `program` quietly; true if it exited successfully
    pub async fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    /// Run a shell pipeline with the terminal attached
    pub async fn shell(&self, script: &str) -> Result<(), ProvisionError> {
        self.run("sh", &["-c", script]).await
    }

    /// Locate `program` on `PATH`
    #[must_use]
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }

    /// Returns true if `program` is on `PATH`
    #[must_use]
    pub fn has(&self, program: &str) -> bool {
        self.which(program).is_some()
    }

    /// The operator's text editor, if one can be found
    #[must_use]
    pub fn editor(&self) -> Option<String> {
        pick_editor(
            std::env::var("EDITOR").ok(),
            std::env::var("VISUAL").ok(),
            |e| self.has(e),
        )
    }
}

/// `EDITOR`, then `VISUAL`, then the first available fallback
fn pick_editor(
    editor: Option<String>,
    visual: Option<String>,
    available: impl Fn(&str) -> bool,
) -> Option<String> {
    editor
        .into_iter()
        .chain(visual)
        .map(|e| e.trim().to_string())
        .find(|e| !e.is_empty())
        .or_else(|| {
            EDITORS
                .into_iter()
                .find(|e| available(e))
                .map(str::to_string)
        })
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn command_error(line: &str, reason: String) -> ProvisionError {
    ProvisionError::Command {
        command: line.to_string(),
        reason,
    }
}

fn check(line: &str, status: ExitStatus) -> Result<(), ProvisionError> {
    if status.success() {
        return Ok(());
    }
    let reason = status
        .code()
        .map_or_else(|| "terminated by signal".to_string(), |code| format!("exit status {code}"));
    Err(command_error(line, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_and_status() {
        let runner = Runner;
        let out = runner.output("sh", &["-c", "echo hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");

        assert!(runner.succeeds("sh", &["-c", "exit 0"]).await);
        assert!(!runner.succeeds("sh", &["-c", "exit 3"]).await);

        let err = runner.output("sh", &["-c", "exit 3"]).await.unwrap_err();
        assert_eq!(err.to_string(), "`sh -c exit 3` failed: exit status 3");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = Runner;
        assert!(!runner.succeeds("galley-no-such-program", &[]).await);
        assert!(matches!(
            runner.output("galley-no-such-program", &[]).await,
            Err(ProvisionError::Command { .. })
        ));
        assert!(!runner.has("galley-no-such-program"));
        assert!(runner.has("sh"));
    }

    #[test]
    fn test_pick_editor() {
        let none = |_: &str| false;
        assert_eq!(
            pick_editor(Some("hx".into()), Some("code".into()), none).as_deref(),
            Some("hx")
        );
        assert_eq!(
            pick_editor(Some(" ".into()), Some("code".into()), none).as_deref(),
            Some("code")
        );
        assert_eq!(
            pick_editor(None, None, |e| e == "vi").as_deref(),
            Some("vi")
        );
        assert_eq!(pick_editor(None, None, none), None);
    }
}
