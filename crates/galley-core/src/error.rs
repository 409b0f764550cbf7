use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while decoding or minting join tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token does not have the expected shape
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A worker join token carried a role other than `worker`
    #[error("join token is not a worker token but a {found:?} token")]
    WrongTokenRole {
        /// Role segment found in the token
        found: String,
    },

    /// A field handed to the encoder contains the token delimiter
    #[error("{field} must not contain the '{delimiter}' delimiter")]
    DelimiterInField {
        /// Name of the offending field
        field: &'static str,
        /// The reserved delimiter character
        delimiter: char,
    },
}

impl TokenError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken(reason.into())
    }

    /// Returns true if the token was rejected for its role
    #[must_use]
    pub const fn is_role_mismatch(&self) -> bool {
        matches!(self, Self::WrongTokenRole { .. })
    }
}

/// Errors talking to the platform control-plane API
#[derive(Error, Debug)]
pub enum AttestError {
    /// No platform URL is configured
    #[error("no platform URL configured")]
    NotConfigured,

    /// The configured platform URL cannot be used
    #[error("invalid platform URL {url:?}: {reason}")]
    InvalidUrl {
        /// URL as configured
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client could not be constructed
    #[error("cannot initialise HTTP client")]
    ClientSetup(#[source] BoxError),

    /// Transport-level failure (DNS, TLS, connect, timeout)
    #[error("platform unreachable at {url}")]
    Unreachable {
        /// Request URL
        url: String,
        /// Underlying transport error
        #[source]
        source: BoxError,
    },

    /// The platform answered with a non-200 status
    #[error("unexpected status code {code}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        code: u16,
        /// Response body, verbatim
        body: String,
    },

    /// The response body is not the expected resource envelope
    #[error("malformed platform response")]
    MalformedResponse(#[source] serde_json::Error),
}

impl AttestError {
    /// Returns true if the failure happened before any HTTP response was received
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Returns the HTTP status code if the platform answered with an error
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors reading or writing persisted agent state
#[derive(Error, Debug)]
pub enum PersistError {
    /// Filesystem failure
    #[error("cannot access {}", path.display())]
    Io {
        /// File that could not be read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not parse
    #[error("corrupt state file {}", path.display())]
    Corrupt {
        /// File that failed to parse
        path: PathBuf,
        /// Parse error
        #[source]
        source: BoxError,
    },
}

impl PersistError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a parse error with the path it concerns
    pub fn corrupt(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Corrupt {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        let err = TokenError::WrongTokenRole {
            found: "controller".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "join token is not a worker token but a \"controller\" token"
        );
        assert!(err.is_role_mismatch());

        let err = TokenError::DelimiterInField {
            field: "cluster id",
            delimiter: '.',
        };
        assert_eq!(err.to_string(), "cluster id must not contain the '.' delimiter");
    }

    #[test]
    fn test_attest_error_status() {
        let err = AttestError::UnexpectedStatus {
            code: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(err.status_code(), Some(403));
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "unexpected status code 403: forbidden");
    }

    #[test]
    fn test_persist_error_keeps_source() {
        use std::error::Error as _;

        let err = PersistError::io(
            "/var/lib/galley/prepare-progress.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("prepare-progress.json"));
    }
}
