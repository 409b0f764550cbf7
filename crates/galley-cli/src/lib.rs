//! # galley-cli
//!
//! Command-line node agent for the Galley platform.
//!
//! ## Commands
//!
//! - **controller join**: join a host as a controller with a console token
//! - **worker join / invite**: join workers, mint worker join tokens
//! - **node prepare**: resumable OS update, hardening and k0s install
//! - **node agent**: maintenance link to the platform
//! - **config / logs**: agent configuration and the action log

pub mod cli;
pub mod logging;
pub mod output;
pub mod prompt;

pub use cli::run;
