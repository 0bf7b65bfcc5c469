//! Router lifecycle operations
//!
//! [`RouterTransport`] knows how to reconfigure the router's VPN: render a
//! vendor's config template for an exit, install it, restart the tunnel and
//! probe whether it came up. How commands and files reach the router is left
//! to the [`CommandRunner`] it was built with.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use vx_core::config::{ConfigSource, RouterConfig, RouterMode};
use vx_core::error::{ConfigError, RestartError, TransportError};
use vx_core::template::{self, vars, TemplateVars};
use vx_core::{Connectivity, ConnectivityState};

use crate::exec::{CommandRunner, LocalRunner};
use crate::ssh::SshRunner;

/// Delay between health checks while waiting for a restart
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Vendor and exit the router is currently configured for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub vendor: String,
    pub exit: String,
    pub path: Vec<String>,
}

/// `<vendor>.config_template` for each vendor that has one
pub fn vendor_templates(config: &dyn ConfigSource, vendors: &[String]) -> HashMap<String, PathBuf> {
    vendors
        .iter()
        .filter_map(|vendor| {
            let template = config.string(&format!("{}.config_template", vendor))?;
            Some((vendor.clone(), PathBuf::from(template)))
        })
        .collect()
}

/// Drives one router
pub struct RouterTransport {
    router: RouterConfig,
    templates: HashMap<String, PathBuf>,
    runner: Arc<dyn CommandRunner>,
    selection: Option<Selection>,
    last_probe: Connectivity,
}

impl RouterTransport {
    pub fn new(
        router: RouterConfig,
        templates: HashMap<String, PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            router,
            templates,
            runner,
            selection: None,
            last_probe: Connectivity::Unknown,
        }
    }

    /// Transport using the runner that `router.mode` asks for
    pub fn from_config(
        router: RouterConfig,
        templates: HashMap<String, PathBuf>,
    ) -> Result<Self, ConfigError> {
        let runner: Arc<dyn CommandRunner> = match router.router_mode()? {
            RouterMode::Local => Arc::new(LocalRunner),
            RouterMode::Ssh => Arc::new(SshRunner::new(&router)),
        };
        tracing::info!("Router transport: {} ({})", router.mode, router.address());
        Ok(Self::new(router, templates, runner))
    }

    pub fn router(&self) -> &RouterConfig {
        &self.router
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Result of the most recent health check
    pub fn last_probe(&self) -> Connectivity {
        self.last_probe
    }

    /// Record what the router is now configured for
    pub fn select(&mut self, vendor: &str, exit: &str, path: Vec<String>) {
        self.selection = Some(Selection {
            vendor: vendor.to_string(),
            exit: exit.to_string(),
            path,
        });
    }

    /// Render the vendor's config for `exit` and install it on the router
    ///
    /// The rendered file is staged in a temporary file which is removed
    /// whether or not the install succeeds.
    pub async fn push_config(&self, vendor: &str, exit: &str) -> Result<(), TransportError> {
        let template_path = self
            .templates
            .get(vendor)
            .ok_or_else(|| TransportError::MissingTemplate(vendor.to_string()))?;
        let vars = TemplateVars::new()
            .with(vars::VPN_SERVER, exit)
            .with(vars::VENDOR, vendor);
        let rendered = template::render_file(template_path, &vars)?;

        let destination = self.router.config_file.as_str();
        let mut staged = NamedTempFile::new_in(self.runner.staging_dir(destination))?;
        staged.write_all(rendered.as_bytes())?;
        staged.flush()?;

        tracing::info!("Installing {} config for {} at {}", vendor, exit, destination);
        self.runner
            .install(staged.path(), destination, self.router.config_mode)
            .await
    }

    /// Run the health check once
    ///
    /// `Unknown` when the check command cannot be rendered, `Down` when it
    /// fails to run or its output lacks the match string.
    pub async fn is_up(&self) -> Connectivity {
        let command = match self.render_command(&self.router.check.command) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Unable to render check command: {}", e);
                return Connectivity::Unknown;
            }
        };

        match self.runner.run(&command).await {
            Ok(output) if output.contains(&self.router.check.pattern) => Connectivity::Up,
            Ok(_) => Connectivity::Down,
            Err(e) => {
                tracing::debug!("Check command failed: {}", e);
                Connectivity::Down
            }
        }
    }

    /// Stop and start the VPN, then wait for the check to match
    ///
    /// Polls once per [`POLL_INTERVAL`] for `router.wait_seconds` polls.
    pub async fn restart(&mut self) -> Result<(), RestartError> {
        let stop = self.render_command(&self.router.stop_command)?;
        let start = self.render_command(&self.router.start_command)?;

        tracing::info!("Restarting VPN");
        self.last_probe = Connectivity::Unknown;
        self.runner.run(&stop).await?;
        self.runner.run(&start).await?;

        let polls = self.router.wait_seconds;
        for attempt in 1..=polls {
            tokio::time::sleep(POLL_INTERVAL).await;
            self.last_probe = self.is_up().await;
            if self.last_probe.is_up() {
                tracing::info!("VPN up after {} check(s)", attempt);
                return Ok(());
            }
            tracing::debug!("VPN not up yet ({}/{})", attempt, polls);
        }

        let (vendor, exit) = self
            .selection
            .as_ref()
            .map(|s| (s.vendor.clone(), s.exit.clone()))
            .unwrap_or_default();
        Err(RestartError::Timeout {
            vendor,
            exit,
            waited_secs: polls,
        })
    }

    /// Raw output of the status command
    pub async fn status(&self) -> Result<String, TransportError> {
        let command = self.render_command(&self.router.status_command)?;
        self.runner.run(&command).await
    }

    fn render_command(&self, command: &str) -> Result<String, TransportError> {
        Ok(template::render(command, &self.command_vars())?)
    }

    fn command_vars(&self) -> TemplateVars {
        let mut state = ConnectivityState::new();
        state.set_connectivity(self.last_probe);
        if let Some(selection) = &self.selection {
            state.vendor = Some(selection.vendor.clone());
            state.exit = Some(selection.exit.clone());
            state.path = selection.path.clone();
        }
        state.template_vars()
    }
}

impl std::fmt::Debug for RouterTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterTransport")
            .field("mode", &self.router.mode)
            .field("selection", &self.selection)
            .field("last_probe", &self.last_probe)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use vx_core::config::CheckConfig;

    /// Scripted runner: records commands, answers the check command from a
    /// queue and everything else with fixed output
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        pub commands: Mutex<Vec<String>>,
        pub installs: Mutex<Vec<(String, String, u32)>>,
        /// Check command outputs, last one repeats
        pub check_outputs: Mutex<Vec<String>>,
        /// Commands starting with this prefix fail
        pub fail_on: Mutex<Option<String>>,
    }

    impl FakeRunner {
        pub fn checks(outputs: &[&str]) -> Self {
            Self {
                check_outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            }
        }

        pub fn failing(self, command_prefix: &str) -> Self {
            self.fail_from_now(command_prefix);
            self
        }

        pub fn fail_from_now(&self, command_prefix: &str) {
            *self.fail_on.lock().unwrap() = Some(command_prefix.to_string());
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }

        pub fn check_count(&self) -> usize {
            self.commands()
                .iter()
                .filter(|c| c.starts_with("ipsec status "))
                .count()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &str) -> Result<String, TransportError> {
            self.commands.lock().unwrap().push(command.to_string());
            if let Some(prefix) = self.fail_on.lock().unwrap().as_deref() {
                if command.starts_with(prefix) {
                    return Err(TransportError::CommandFailed {
                        command: command.to_string(),
                        status: Some(1),
                        stderr: "boom".to_string(),
                    });
                }
            }
            if command.starts_with("ipsec status ") {
                let mut outputs = self.check_outputs.lock().unwrap();
                let output = if outputs.len() > 1 {
                    outputs.remove(0)
                } else {
                    outputs.first().cloned().unwrap_or_default()
                };
                return Ok(output);
            }
            Ok(format!("ran {}\n", command))
        }

        async fn install(
            &self,
            source: &Path,
            destination: &str,
            mode: u32,
        ) -> Result<(), TransportError> {
            let content = std::fs::read_to_string(source)?;
            self.installs
                .lock()
                .unwrap()
                .push((destination.to_string(), content, mode));
            Ok(())
        }
    }

    pub(crate) fn router(wait_seconds: u64) -> RouterConfig {
        RouterConfig {
            mode: "local".to_string(),
            config_file: "/etc/ipsec.conf".to_string(),
            start_command: "ipsec start {{ .Vendor }}".to_string(),
            stop_command: "ipsec stop".to_string(),
            status_command: "ipsec statusall {{ .Exit }}".to_string(),
            check: CheckConfig {
                command: "ipsec status {{ .Vendor }}".to_string(),
                pattern: "ESTABLISHED".to_string(),
            },
            wait_seconds,
            ..Default::default()
        }
    }

    pub(crate) fn template_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "conn {{{{ .Vendor }}}}\n  right={{{{ .VpnServer }}}}\n").unwrap();
        file
    }

    fn transport(runner: Arc<FakeRunner>, template: &Path, wait: u64) -> RouterTransport {
        let templates = HashMap::from([("acme".to_string(), template.to_path_buf())]);
        RouterTransport::new(router(wait), templates, runner)
    }

    #[tokio::test]
    async fn test_push_config_renders_and_installs() {
        let runner = Arc::new(FakeRunner::default());
        let template = template_file();
        let transport = transport(runner.clone(), template.path(), 5);

        transport.push_config("acme", "198.51.100.7").await.unwrap();

        let installs = runner.installs.lock().unwrap();
        assert_eq!(installs.len(), 1);
        let (destination, content, mode) = &installs[0];
        assert_eq!(destination, "/etc/ipsec.conf");
        assert_eq!(content, "conn acme\n  right=198.51.100.7\n");
        assert_eq!(*mode, 0o644);
    }

    #[tokio::test]
    async fn test_push_config_without_template() {
        let runner = Arc::new(FakeRunner::default());
        let template = template_file();
        let transport = transport(runner, template.path(), 5);

        assert!(matches!(
            transport.push_config("other", "x").await,
            Err(TransportError::MissingTemplate(v)) if v == "other"
        ));
    }

    #[tokio::test]
    async fn test_is_up_tri_state() {
        let template = template_file();

        let up = transport(
            Arc::new(FakeRunner::checks(&["conn acme ESTABLISHED"])),
            template.path(),
            5,
        );
        assert_eq!(up.is_up().await, Connectivity::Up);
        // repeated probes with nothing changed agree
        assert_eq!(up.is_up().await, Connectivity::Up);

        let down = transport(
            Arc::new(FakeRunner::checks(&["no tunnels"])),
            template.path(),
            5,
        );
        assert_eq!(down.is_up().await, Connectivity::Down);
        assert_eq!(down.is_up().await, Connectivity::Down);

        let failing = transport(
            Arc::new(FakeRunner::checks(&["ESTABLISHED"]).failing("ipsec status")),
            template.path(),
            5,
        );
        assert_eq!(failing.is_up().await, Connectivity::Down);

        let mut broken = router(5);
        broken.check.command = "ipsec status {{ .Vendor".to_string();
        let unknown = RouterTransport::new(
            broken,
            HashMap::new(),
            Arc::new(FakeRunner::checks(&["ESTABLISHED"])),
        );
        assert_eq!(unknown.is_up().await, Connectivity::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_succeeds_after_polls() {
        let runner = Arc::new(FakeRunner::checks(&["down", "down", "down", "ESTABLISHED"]));
        let template = template_file();
        let mut transport = transport(runner.clone(), template.path(), 10);
        transport.select("acme", "198.51.100.7", vec!["us".to_string()]);

        let begin = tokio::time::Instant::now();
        transport.restart().await.unwrap();

        assert_eq!(begin.elapsed(), Duration::from_secs(4));
        assert_eq!(runner.check_count(), 4);
        assert_eq!(transport.last_probe(), Connectivity::Up);
        let commands = runner.commands();
        assert_eq!(commands[0], "ipsec stop");
        assert_eq!(commands[1], "ipsec start acme");
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_times_out() {
        let runner = Arc::new(FakeRunner::checks(&["no tunnels"]));
        let template = template_file();
        let mut transport = transport(runner.clone(), template.path(), 5);
        transport.select("acme", "198.51.100.7", Vec::new());

        let begin = tokio::time::Instant::now();
        let err = transport.restart().await.unwrap_err();

        assert_eq!(begin.elapsed(), Duration::from_secs(5));
        assert_eq!(runner.check_count(), 5);
        assert!(matches!(
            err,
            RestartError::Timeout { waited_secs: 5, ref vendor, .. } if vendor == "acme"
        ));
        assert_eq!(transport.last_probe(), Connectivity::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_stop_failure_aborts() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]).failing("ipsec stop"));
        let template = template_file();
        let mut transport = transport(runner.clone(), template.path(), 5);

        let err = transport.restart().await.unwrap_err();
        assert!(matches!(err, RestartError::Transport(_)));
        assert_eq!(runner.commands(), vec!["ipsec stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_forgets_previous_probe() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]));
        let template = template_file();
        let mut transport = transport(runner.clone(), template.path(), 5);

        transport.restart().await.unwrap();
        assert_eq!(transport.last_probe(), Connectivity::Up);

        runner.fail_from_now("ipsec start");
        assert!(matches!(
            transport.restart().await,
            Err(RestartError::Transport(_))
        ));
        assert_eq!(transport.last_probe(), Connectivity::Unknown);
    }

    #[tokio::test]
    async fn test_status_uses_selection() {
        let runner = Arc::new(FakeRunner::default());
        let template = template_file();
        let mut transport = transport(runner, template.path(), 5);
        transport.select("acme", "198.51.100.7", Vec::new());

        assert_eq!(
            transport.status().await.unwrap(),
            "ran ipsec statusall 198.51.100.7\n"
        );
    }

    #[test]
    fn test_vendor_templates() {
        let config = vx_core::config::TomlConfig::from_str_with_defaults(
            r#"
vendors = ["acme", "flat"]
[acme]
config_template = "/etc/vpnexiter/acme.tmpl"
"#,
        )
        .unwrap();
        let templates = vendor_templates(&config, &["acme".to_string(), "flat".to_string()]);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates["acme"], PathBuf::from("/etc/vpnexiter/acme.tmpl"));
    }
}
