use galley_core::{AttestError, ClusterRole, PersistError, TokenError, UnknownRole};
use thiserror::Error;

use crate::engine::Step;

/// Errors surfaced by the provisioning workflows
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The join token could not be decoded
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The platform could not be reached or rejected a request
    #[error("platform request failed")]
    Attest(#[from] AttestError),

    /// Agent state could not be read or written
    #[error("cannot persist agent state")]
    Persist(#[from] PersistError),

    /// The platform declared a role this agent does not know
    #[error("platform returned an invalid node record")]
    UnknownRole(#[from] UnknownRole),

    /// A required binary, service or prior step is missing
    #[error("{message}")]
    Precondition {
        /// What is missing
        message: String,
        /// How the operator can fix it
        hint: String,
    },

    /// The token admits a role that cannot run this workflow
    #[error("this node is registered as {found}, which cannot join as a controller")]
    RoleMismatch {
        /// Role the platform declared
        found: ClusterRole,
    },

    /// An operator tried to set a key the agent manages itself
    #[error("unknown or read-only config key {key:?} (settable: download_base, platform_url, client_url)")]
    UnknownConfigKey {
        /// Rejected key
        key: String,
    },

    /// An external command could not be run or exited unsuccessfully
    #[error("`{command}` failed: {reason}")]
    Command {
        /// Command line, without secrets
        command: String,
        /// Exit status or spawn error
        reason: String,
    },

    /// Host filesystem failure outside the agent's own state
    #[error("{context}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A provisioning step's action failed
    #[error("step {step} failed")]
    StepFailed {
        /// Failed step
        step: Step,
        /// Cause
        #[source]
        source: Box<ProvisionError>,
    },

    /// A step was attempted while an earlier one is incomplete
    #[error("step {step} cannot run before {pending} has completed")]
    OutOfOrder {
        /// Step that was attempted
        step: Step,
        /// Earliest incomplete step
        pending: Step,
    },

    /// A step outside the current plan was attempted
    #[error("step {step} is not part of this workflow")]
    NotPlanned {
        /// Step that was attempted
        step: Step,
    },

    /// A controller joined, but its first worker token could not be minted
    #[error("joined cluster {cluster_id}, but no worker join token could be created")]
    InviteFailed {
        /// Cluster the node is now part of
        cluster_id: String,
        /// Cause
        #[source]
        source: Box<ProvisionError>,
    },

    /// A step was attempted after an earlier failure in the same run
    #[error("provisioning halted after step {failed} failed")]
    Halted {
        /// Step that failed
        failed: Step,
    },
}

impl ProvisionError {
    pub(crate) fn precondition(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Remediation hint for the operator, if any
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Precondition { hint, .. } => Some(hint),
            Self::StepFailed { source, .. } => source.hint(),
            Self::Token(e) if e.is_role_mismatch() => {
                Some("worker join only accepts tokens minted by `galley worker invite`")
            }
            Self::Halted { .. } => Some("re-run the command to resume from the failed step"),
            Self::InviteFailed { .. } => {
                Some("the join itself succeeded; run `galley worker invite` to mint a worker token")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_reaches_through_step_failure() {
        let err = ProvisionError::StepFailed {
            step: Step::RuntimeInstall,
            source: Box::new(ProvisionError::precondition(
                "k0s is not installed",
                "run `galley node prepare` first",
            )),
        };
        assert_eq!(err.to_string(), "step runtime_install failed");
        assert_eq!(err.hint(), Some("run `galley node prepare` first"));
    }

    #[test]
    fn test_token_errors_pass_through() {
        let err: ProvisionError = TokenError::WrongTokenRole {
            found: "controller".to_string(),
        }
        .into();
        assert!(err.to_string().contains("not a worker token"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_invite_failure_says_the_join_succeeded() {
        let err = ProvisionError::InviteFailed {
            cluster_id: "c-1".to_string(),
            source: Box::new(ProvisionError::Command {
                command: "k0s token create --role worker --expiry=1h".to_string(),
                reason: "exit status 1".to_string(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "joined cluster c-1, but no worker join token could be created"
        );
        assert!(err.hint().unwrap().contains("galley worker invite"));
    }
}
