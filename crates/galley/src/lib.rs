//! Galley node agent.
//!
//! Turns a fresh Linux host into a node of a Galley-managed k0s cluster:
//! hardens and prepares the host, joins it as a controller or a worker and
//! reports it ready to the platform.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use galley::provision::{host::AcceptDefaults, Collaborators, Environment, Installer};
//! use galley::PlatformClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let platform = PlatformClient::new("https://api.galley.run")?;
//!     let installer = Installer::new(
//!         Environment::system(),
//!         platform,
//!         Collaborators::system(Arc::new(AcceptDefaults)),
//!     );
//!
//!     let joined = installer.controller_join("eyJhbGciOi...").await?;
//!     if let Some(invite) = joined.invite {
//!         println!("galley worker join {}", invite.token);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS

#![doc(html_root_url = "https://docs.rs/galley/2.0.0")]

// Re-export core types
pub use galley_core::*;

// Re-export client
pub use galley_client::{
    release, LinkError, MaintenanceLink, PlatformClient, PlatformClientBuilder, ReleaseChannel,
    ReleaseError, RetryConfig,
};

// Re-export the workflows
pub use galley_provision as provision;

// Re-export runtime for convenience
pub use tokio;
