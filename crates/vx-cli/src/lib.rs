//! vpnexiter: Command-line interface
//!
//! Provides the `vpnexiter` CLI for browsing vendor server directories and
//! switching the router's VPN exit.

pub mod commands;
pub mod context;
pub mod output;
