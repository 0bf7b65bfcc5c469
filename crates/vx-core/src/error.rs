//! Core error types for vpnexiter

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Vendor is not listed in `vendors`
    #[error("{0} vendor is not defined")]
    UnknownVendor(String),

    /// Vendor declares more hierarchy levels than supported
    #[error("Invalid number of vendor levels for {vendor}: {levels} (max {max})")]
    UnsupportedDepth {
        vendor: String,
        levels: usize,
        max: usize,
    },

    /// `router.mode` is neither `local` nor `ssh`
    #[error("Unsupported router mode: {0}")]
    UnsupportedMode(String),
}

/// Template rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// A `{{` without its closing `}}`
    #[error("Unterminated placeholder at offset {offset}")]
    Unterminated { offset: usize },

    /// Placeholder names a variable that was not provided
    #[error("Unknown template variable: {0}")]
    UnknownVariable(String),

    /// Template file could not be read
    #[error("Unable to read template {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Hostname lookup failure while building a directory
#[derive(Error, Debug)]
#[error("Error resolving {host}: {source}")]
pub struct ResolutionError {
    /// Identifier that failed to resolve
    pub host: String,
    /// Underlying lookup error
    #[source]
    pub source: std::io::Error,
}

/// Server directory errors
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Node is already committed to the other kind
    #[error("Type conflict: node is already a {existing}, cannot write a {attempted}")]
    TypeConflict {
        existing: &'static str,
        attempted: &'static str,
    },

    /// Vendor configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors talking to the router, locally or over SSH
#[derive(Error, Debug)]
pub enum TransportError {
    /// Command line rendered to nothing
    #[error("Empty command")]
    EmptyCommand,

    /// Local process could not be started
    #[error("Unable to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Command ran but reported failure
    #[error("`{command}` failed (exit status {status:?}): {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// SSH connection could not be established
    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    /// Router rejected our credentials
    #[error("Authentication rejected for user {user}")]
    AuthRejected { user: String },

    /// SSH protocol error after the connection was up
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Config file could not be placed on the router
    #[error("Failed to copy config to {destination}: {message}")]
    Copy {
        destination: String,
        message: String,
    },

    /// Vendor has no `config_template`
    #[error("No config_template configured for {0}")]
    MissingTemplate(String),

    /// Command or config template failed to render
    #[error(transparent)]
    Render(#[from] RenderError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors restarting the VPN on the router
#[derive(Error, Debug)]
pub enum RestartError {
    /// Stop or start command failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Check never matched within the wait duration
    #[error("{exit} VPN to {vendor} did not come up after {waited_secs} seconds")]
    Timeout {
        vendor: String,
        exit: String,
        waited_secs: u64,
    },
}

/// Errors selecting a new exit
#[derive(Error, Debug)]
pub enum SelectError {
    /// Vendor has no directory
    #[error("{0} vendor is not defined")]
    UnknownVendor(String),

    /// Exit is not present anywhere in the vendor's directory
    #[error("{exit} is not a known {vendor} exit")]
    ExitNotFound { vendor: String, exit: String },

    /// Config could not be pushed to the router
    #[error("Unable to update router config: {0}")]
    Push(#[source] TransportError),

    /// VPN did not come back up
    #[error(transparent)]
    Restart(#[from] RestartError),

    /// Status command failed after a successful restart
    #[error("Unable to read VPN status: {0}")]
    Status(#[source] TransportError),
}
