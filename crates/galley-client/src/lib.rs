//! Platform client for the Galley node agent.
//!
//! [`PlatformClient`] reads the node record the platform holds for this host
//! and reports the host ready once provisioning succeeded.
//! [`MaintenanceLink`] keeps a websocket open to the platform for
//! out-of-band notifications, reconnecting with exponential backoff.
//! [`ReleaseChannel`] finds and downloads new agent builds.

#![doc(html_root_url = "https://docs.rs/galley-client/2.0.0")]

mod client;
mod config;
pub mod api;
pub mod link;
pub mod release;

pub use client::{PlatformClient, PlatformClientBuilder};
pub use config::*;
pub use galley_core::AttestError;
pub use link::{LinkError, MaintenanceLink};
pub use release::{ReleaseChannel, ReleaseError};
