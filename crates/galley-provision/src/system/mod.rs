//! Collaborators for a real Linux host: k0s through its CLI and systemd,
//! the distribution's package manager, and sshd/login.defs hardening.

mod command;
mod facts;
mod hardening;
mod k0s;
mod packages;

pub use command::Runner;
pub use facts::measure;
pub use hardening::SystemHost;
pub use k0s::{install_args, service_unit, K0sRuntime};
pub use packages::PackageManager;
