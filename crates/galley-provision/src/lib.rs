//! Node provisioning and cluster join workflows.
//!
//! - [`StepEngine`] runs the fixed provisioning sequence, persisting each
//!   completed step so an interrupted run resumes where it stopped.
//! - [`Installer`] binds the engine, the platform client and the token codec
//!   to the `node prepare`, `controller join`, `worker join` and
//!   `worker invite` workflows.
//! - [`host`] defines the capabilities the workflows drive (prompts, the
//!   cluster runtime, host maintenance); [`system`] implements them for a
//!   real Linux host running k0s.
//!
//! Concurrent invocations against the same host are not guarded: the
//! progress file and config file assume a single running agent.

#![doc(html_root_url = "https://docs.rs/galley-provision/2.0.0")]

mod config;
mod engine;
mod env;
mod error;
pub mod host;
mod installer;
mod session;
pub mod system;

pub use config::{AgentConfig, OPERATOR_KEYS};
pub use engine::{Step, StepEngine, StepOutcome, StepPlan, StepReport, StepState};
pub use env::{real_user_home, Environment};
pub use error::ProvisionError;
pub use installer::{
    Collaborators, Installer, JoinOutcome, PrepareOutcome, WorkerInvite, WorkflowOptions,
    DEFAULT_INVITE_EXPIRY,
};
pub use session::{JoinTarget, ProvisioningSession, SessionStore};
