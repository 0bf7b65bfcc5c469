//! vx-core: Shared building blocks for vpnexiter
//!
//! This crate provides the configuration provider, the error taxonomy,
//! the command/config template renderer and the connectivity types used
//! by the directory, router and CLI crates.

pub mod config;
pub mod error;
pub mod template;
pub mod types;

pub use types::{Connectivity, ConnectivityState};
