//! Core types for the Galley node agent.
//!
//! This crate provides the foundational pieces shared by the agent crates:
//!
//! - **Token codec**: decoding platform-issued auth tokens and minting/decoding
//!   self-issued worker join tokens ([`token`])
//! - **Types**: cluster roles, node identity, platform node records and the
//!   ready-report payload
//! - **Errors**: [`TokenError`], [`AttestError`] and [`PersistError`]
//!
//! # Example
//!
//! ```rust
//! use galley_core::token::{decode_worker_token, encode_worker_token};
//!
//! let token = encode_worker_token("6f1c2a", "k0s-secret").unwrap();
//! let identity = decode_worker_token(&token).unwrap();
//! assert_eq!(identity.cluster_id, "6f1c2a");
//! assert_eq!(identity.secret.expose(), "k0s-secret");
//! ```

#![doc(html_root_url = "https://docs.rs/galley-core/2.0.0")]

mod error;
pub mod token;
pub mod types;

pub use error::{AttestError, PersistError, TokenError};
pub use token::AuthToken;
pub use types::*;
