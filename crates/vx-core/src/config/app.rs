//! Fixed-shape application configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::serde_utils::{duration_secs, file_mode};
use crate::error::ConfigError;

/// Shortest accepted directory refresh interval
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Refresh interval used when none (or an invalid one) is configured
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Top level settings that do not depend on vendor hierarchy depth
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Vendor names; each has its own `[<vendor>]` table
    pub vendors: Vec<String>,

    /// How often server directories are rebuilt
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,

    /// Listener settings for the web front end
    pub listen: ListenConfig,

    /// The router being reconfigured
    pub router: RouterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vendors: Vec::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            listen: ListenConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl AppConfig {
    /// Refresh interval to actually use
    ///
    /// Values below [`MIN_REFRESH_INTERVAL`] are ignored, not clamped.
    pub fn effective_refresh_interval(&self) -> Duration {
        if self.refresh_interval < MIN_REFRESH_INTERVAL {
            tracing::warn!(
                "Ignoring refresh_interval of {}s (minimum {}s), using {}s",
                self.refresh_interval.as_secs(),
                MIN_REFRESH_INTERVAL.as_secs(),
                DEFAULT_REFRESH_INTERVAL.as_secs()
            );
            DEFAULT_REFRESH_INTERVAL
        } else {
            self.refresh_interval
        }
    }
}

/// Web listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub address: String,
    pub http: i64,
    pub https: i64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            http: 8000,
            https: -1,
            username: None,
            password: None,
        }
    }
}

/// How commands reach the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// vpnexiter runs on the router itself
    Local,
    /// Commands and config are sent over SSH
    Ssh,
}

impl FromStr for RouterMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(RouterMode::Local),
            "ssh" => Ok(RouterMode::Ssh),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for RouterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterMode::Local => write!(f, "local"),
            RouterMode::Ssh => write!(f, "ssh"),
        }
    }
}

/// Router connection and command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// `local` or `ssh`
    pub mode: String,

    /// Where the rendered VPN config is installed
    pub config_file: String,

    /// Permission bits for the installed config (ssh only)
    #[serde(with = "file_mode")]
    pub config_mode: u32,

    pub start_command: String,
    pub stop_command: String,
    pub status_command: String,

    /// Health check run after a restart
    pub check: CheckConfig,

    /// How long to wait for the check to match after a restart
    pub wait_seconds: u64,

    // SSH only
    pub host: String,
    pub port: u16,
    #[serde(alias = "username")]
    pub user: String,
    pub password: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: "ssh".to_string(),
            config_file: String::new(),
            config_mode: 0o644,
            start_command: String::new(),
            stop_command: String::new(),
            status_command: String::new(),
            check: CheckConfig::default(),
            wait_seconds: 5,
            host: "192.168.1.1".to_string(),
            port: 22,
            user: "admin".to_string(),
            password: None,
        }
    }
}

impl RouterConfig {
    /// Parsed transport mode
    pub fn router_mode(&self) -> Result<RouterMode, ConfigError> {
        self.mode.parse()
    }

    /// Bounded wait for the post-restart check
    pub fn wait_duration(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }

    /// `host:port` for SSH connections
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Post-restart health check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Command template to run
    pub command: String,

    /// Substring whose presence in the output means the VPN is up
    #[serde(rename = "match")]
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TomlConfig;

    #[test]
    fn test_router_defaults() {
        let app = TomlConfig::defaults().app().unwrap();
        assert_eq!(app.router.router_mode().unwrap(), RouterMode::Ssh);
        assert_eq!(app.router.address(), "192.168.1.1:22");
        assert_eq!(app.router.user, "admin");
        assert_eq!(app.router.wait_duration(), Duration::from_secs(5));
        assert_eq!(app.router.config_mode, 0o644);
        assert_eq!(app.refresh_interval, DEFAULT_REFRESH_INTERVAL);
    }

    #[test]
    fn test_router_section_parses() {
        let config = TomlConfig::from_str_with_defaults(
            r#"
refresh_interval = 900

[router]
mode = "local"
username = "root"
config_mode = "0600"
wait_seconds = 10

[router.check]
command = "ipsec status {{ .Vendor }}"
match = "ESTABLISHED"
"#,
        )
        .unwrap();
        let app = config.app().unwrap();
        assert_eq!(app.router.router_mode().unwrap(), RouterMode::Local);
        assert_eq!(app.router.user, "root");
        assert_eq!(app.router.config_mode, 0o600);
        assert_eq!(app.router.check.pattern, "ESTABLISHED");
        assert_eq!(app.effective_refresh_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_unsupported_mode() {
        let router = RouterConfig {
            mode: "telnet".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            router.router_mode(),
            Err(ConfigError::UnsupportedMode(m)) if m == "telnet"
        ));
    }

    #[test]
    fn test_short_refresh_interval_is_ignored() {
        let app = AppConfig {
            refresh_interval: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(app.effective_refresh_interval(), DEFAULT_REFRESH_INTERVAL);
    }
}
