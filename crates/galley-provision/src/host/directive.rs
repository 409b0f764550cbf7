use std::path::Path;
use tracing::info;

use super::HostConfigEditor;
use crate::error::ProvisionError;

/// Marker written above directives the agent appends
const ADDED_MARKER: &str = "# Added by Galley";

/// How a directive's key and value are separated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `PermitRootLogin no`
    Space,
    /// `PASS_MAX_DAYS\t90`
    Tab,
    /// `Prompt=lts`
    Equals,
}

impl Separator {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Space => " ",
            Self::Tab => "\t",
            Self::Equals => "=",
        }
    }

    fn split(self, line: &str) -> Option<(&str, &str)> {
        match self {
            Self::Equals => line.split_once('=').map(|(k, v)| (k.trim(), v.trim())),
            Self::Space | Self::Tab => {
                let line = line.trim();
                let end = line.find(char::is_whitespace).unwrap_or(line.len());
                Some((&line[..end], line[end..].trim()))
            }
        }
    }
}

/// Line-oriented directive editing over a file's text.
///
/// Comment lines (`#`) and blank lines are never matched; keys match
/// exactly and case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveFile {
    separator: Separator,
}

impl DirectiveFile {
    #[must_use]
    pub const fn new(separator: Separator) -> Self {
        Self { separator }
    }

    /// `sshd_config` style
    #[must_use]
    pub const fn sshd() -> Self {
        Self::new(Separator::Space)
    }

    /// `login.defs` style
    #[must_use]
    pub const fn login_defs() -> Self {
        Self::new(Separator::Tab)
    }

    /// Value of the first active `key` directive in `content`
    #[must_use]
    pub fn read<'a>(&self, content: &'a str, key: &str) -> Option<&'a str> {
        content
            .lines()
            .filter(|line| is_active(line))
            .filter_map(|line| self.separator.split(line))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Rewrite `content` so `key` has `value`; `None` if already so.
    ///
    /// The first active occurrence is replaced in place; a missing directive
    /// is appended under a marker comment.
    #[must_use]
    pub fn set(&self, content: &str, key: &str, value: &str) -> Option<String> {
        let wanted = format!("{key}{}{value}", self.separator.as_str());
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

        let existing = lines.iter().position(|line| {
            is_active(line) && self.separator.split(line).is_some_and(|(k, _)| k == key)
        });

        match existing {
            Some(index) if lines[index].trim() == wanted => return None,
            Some(index) => lines[index] = wanted,
            None => {
                if lines.last().is_some_and(|line| !line.trim().is_empty()) {
                    lines.push(String::new());
                }
                lines.push(ADDED_MARKER.to_string());
                lines.push(wanted);
            }
        }

        Some(join_lines(&lines))
    }

    /// Add `key` with `value` unless `content` already has an active `key`
    #[must_use]
    pub fn ensure(&self, content: &str, key: &str, value: &str) -> Option<String> {
        if self.read(content, key).is_some() {
            return None;
        }
        self.set(content, key, value)
    }

    fn rewrite(
        &self,
        path: &Path,
        edit: impl FnOnce(&str) -> Option<String>,
    ) -> Result<bool, ProvisionError> {
        let content = read_file(path)?;
        let Some(updated) = edit(&content) else {
            return Ok(false);
        };
        std::fs::write(path, updated)
            .map_err(|e| ProvisionError::io(format!("cannot write {}", path.display()), e))?;
        info!(path = %path.display(), "updated host configuration");
        Ok(true)
    }
}

impl HostConfigEditor for DirectiveFile {
    fn read_directive(&self, path: &Path, key: &str) -> Result<Option<String>, ProvisionError> {
        let content = read_file(path)?;
        Ok(self.read(&content, key).map(str::to_string))
    }

    fn set_directive(&self, path: &Path, key: &str, value: &str) -> Result<bool, ProvisionError> {
        self.rewrite(path, |content| self.set(content, key, value))
    }

    fn ensure_present(
        &self,
        path: &Path,
        key: &str,
        value: &str,
    ) -> Result<bool, ProvisionError> {
        self.rewrite(path, |content| self.ensure(content, key, value))
    }
}

fn is_active(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn read_file(path: &Path) -> Result<String, ProvisionError> {
    std::fs::read_to_string(path)
        .map_err(|e| ProvisionError::io(format!("cannot read {}", path.display()), e))
}
