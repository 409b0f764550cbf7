//! Logging setup: compact output on stderr plus an append-only action log.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level. If the action log cannot be opened (for
/// instance when not running as root) only stderr is used.
pub fn init(log_path: &Path, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    let file = open_log(log_path).map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });
    let degraded = file.is_none();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init();

    if degraded {
        tracing::debug!(path = %log_path.display(), "action log unavailable, logging to stderr only");
    }
}

fn open_log(path: &Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Last `lines` lines of `content`.
#[must_use]
pub fn tail(content: &str, lines: usize) -> Vec<&str> {
    let all: Vec<&str> = content.lines().collect();
    all[all.len().saturating_sub(lines)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail() {
        let content = "one\ntwo\nthree\n";
        assert_eq!(tail(content, 2), vec!["two", "three"]);
        assert_eq!(tail(content, 10), vec!["one", "two", "three"]);
        assert!(tail(content, 0).is_empty());
        assert!(tail("", 5).is_empty());
    }

    #[test]
    fn test_open_log_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("log/galley.log");
        assert!(open_log(&path).is_some());
        assert!(path.exists());
    }
}
