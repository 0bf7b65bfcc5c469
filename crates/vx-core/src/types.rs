//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::template::{vars, TemplateVars};

/// Tri-state VPN connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Check command output matched
    Up,
    /// Check ran and did not match, or could not be run
    Down,
    /// Nothing is known yet, or the check could not be rendered
    #[default]
    Unknown,
}

impl Connectivity {
    /// Human label shown to operators
    pub fn label(&self) -> &'static str {
        match self {
            Connectivity::Up => "Connected",
            Connectivity::Down => "Disconnected",
            Connectivity::Unknown => "Unknown",
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Connectivity::Up)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Up => write!(f, "up"),
            Connectivity::Down => write!(f, "down"),
            Connectivity::Unknown => write!(f, "unknown"),
        }
    }
}

/// What the process currently believes about the tunnel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub connectivity: Connectivity,
    /// Human label for `connectivity`
    pub label: String,
    /// Last captured status command output
    pub status_text: String,
    /// Active vendor
    pub vendor: Option<String>,
    /// Active exit
    pub exit: Option<String>,
    /// Directory keys from the vendor root to the exit's list
    pub path: Vec<String>,
}

impl ConnectivityState {
    /// Fresh state: nothing selected, connectivity unknown
    pub fn new() -> Self {
        Self {
            label: Connectivity::Unknown.label().to_string(),
            ..Default::default()
        }
    }

    /// Replace the connectivity value and keep the label in sync
    pub fn set_connectivity(&mut self, connectivity: Connectivity) {
        self.connectivity = connectivity;
        self.label = connectivity.label().to_string();
    }

    /// Variables exposed to router command templates
    pub fn template_vars(&self) -> TemplateVars {
        TemplateVars::new()
            .with(vars::VENDOR, self.vendor.clone().unwrap_or_default())
            .with(vars::EXIT, self.exit.clone().unwrap_or_default())
            .with(vars::CONNECTED, self.label.clone())
            .with(vars::EXIT_PATH, self.path.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_labels() {
        assert_eq!(Connectivity::Up.label(), "Connected");
        assert_eq!(Connectivity::Down.label(), "Disconnected");
        assert_eq!(format!("{}", Connectivity::Unknown), "unknown");
        assert!(Connectivity::Up.is_up());
        assert!(!Connectivity::Unknown.is_up());
    }

    #[test]
    fn test_state_label_tracks_connectivity() {
        let mut state = ConnectivityState::new();
        assert_eq!(state.label, "Unknown");
        state.set_connectivity(Connectivity::Down);
        assert_eq!(state.connectivity, Connectivity::Down);
        assert_eq!(state.label, "Disconnected");
    }

    #[test]
    fn test_template_vars() {
        let state = ConnectivityState {
            vendor: Some("acme".into()),
            exit: Some("10.0.0.5".into()),
            path: vec!["us".into(), "Denver".into()],
            ..ConnectivityState::new()
        };
        let vars = state.template_vars();
        assert_eq!(vars.get("Vendor"), Some("acme"));
        assert_eq!(vars.get("ExitPath"), Some("us/Denver"));
        assert_eq!(vars.get("Connected"), Some("Unknown"));
    }
}
