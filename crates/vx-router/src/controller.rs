//! Exit selection
//!
//! The controller is the only writer of the connectivity state. Selections
//! run one at a time: the router transport sits behind an async mutex so two
//! requests can never interleave their stop/start sequences.

use tokio::sync::Mutex;

use vx_core::error::{SelectError, TransportError};
use vx_core::{Connectivity, ConnectivityState};
use vx_directory::DirectoryRegistry;

use crate::state::{ConnectivityPublisher, ConnectivityReader};
use crate::transport::RouterTransport;

/// Turns "use this exit" requests into router reconfigurations
pub struct SessionController {
    directories: DirectoryRegistry,
    transport: Mutex<RouterTransport>,
    publisher: ConnectivityPublisher,
}

impl SessionController {
    pub fn new(directories: DirectoryRegistry, transport: RouterTransport) -> Self {
        let (publisher, _reader) = ConnectivityPublisher::new();
        Self {
            directories,
            transport: Mutex::new(transport),
            publisher,
        }
    }

    /// Read handle on the connectivity state
    pub fn reader(&self) -> ConnectivityReader {
        self.publisher.reader()
    }

    pub fn snapshot(&self) -> ConnectivityState {
        self.publisher.snapshot()
    }

    pub fn directories(&self) -> &DirectoryRegistry {
        &self.directories
    }

    /// Point the router at `exit` of `vendor` and wait for the VPN to come up
    ///
    /// Connectivity goes `Down` as soon as the new config is installed and
    /// only becomes `Up` after the health check matched and the status
    /// command succeeded.
    pub async fn select_exit(
        &self,
        vendor: &str,
        exit: &str,
    ) -> Result<ConnectivityState, SelectError> {
        let mut transport = self.transport.lock().await;

        let directory = self
            .directories
            .get(vendor)
            .ok_or_else(|| SelectError::UnknownVendor(vendor.to_string()))?;
        let path = directory
            .find_path(exit)
            .ok_or_else(|| SelectError::ExitNotFound {
                vendor: vendor.to_string(),
                exit: exit.to_string(),
            })?;
        tracing::info!("Selecting {} exit {} ({})", vendor, exit, path.join("/"));

        transport
            .push_config(vendor, exit)
            .await
            .map_err(SelectError::Push)?;
        transport.select(vendor, exit, path.clone());
        self.publisher.set_connectivity(Connectivity::Down);

        if let Err(e) = transport.restart().await {
            let probe = transport.last_probe();
            self.publisher.set_connectivity(probe);
            tracing::error!("Restart failed: {}", e);
            return Err(e.into());
        }

        let status_text = transport.status().await.map_err(SelectError::Status)?;

        self.publisher.update(|state| {
            state.set_connectivity(Connectivity::Up);
            state.vendor = Some(vendor.to_string());
            state.exit = Some(exit.to_string());
            state.path = path;
            state.status_text = status_text;
        });
        Ok(self.publisher.snapshot())
    }

    /// Re-run the health check and publish the result
    pub async fn check(&self) -> Connectivity {
        let transport = self.transport.lock().await;
        let connectivity = transport.is_up().await;
        self.publisher.set_connectivity(connectivity);
        connectivity
    }

    /// Run the status command and publish its output
    pub async fn refresh_status(&self) -> Result<String, TransportError> {
        let transport = self.transport.lock().await;
        let text = transport.status().await?;
        self.publisher.update(|state| state.status_text = text.clone());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::{router, template_file, FakeRunner};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use vx_core::config::TomlConfig;
    use vx_directory::{bootstrap, Resolver};

    async fn registry() -> DirectoryRegistry {
        let config = TomlConfig::from_str_with_defaults(
            r#"
vendors = ["acme"]
[acme]
levels = ["region"]
[acme.servers]
us = ["a.example.com"]
eu = ["b.example.com"]
"#,
        )
        .unwrap();
        let (registry, _refresher) = bootstrap(
            Arc::new(config),
            &["acme".to_string()],
            Resolver::system(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
        registry
    }

    async fn controller(
        runner: Arc<FakeRunner>,
        template: &tempfile::NamedTempFile,
        wait: u64,
    ) -> SessionController {
        let templates = HashMap::from([("acme".to_string(), template.path().to_path_buf())]);
        let transport = RouterTransport::new(router(wait), templates, runner);
        SessionController::new(registry().await, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_exit_success() {
        let runner = Arc::new(FakeRunner::checks(&["down", "ESTABLISHED"]));
        let template = template_file();
        let controller = controller(runner.clone(), &template, 5).await;
        let reader = controller.reader();

        let state = controller.select_exit("acme", "a.example.com").await.unwrap();

        assert_eq!(state.connectivity, Connectivity::Up);
        assert_eq!(state.label, "Connected");
        assert_eq!(state.vendor.as_deref(), Some("acme"));
        assert_eq!(state.exit.as_deref(), Some("a.example.com"));
        assert_eq!(state.path, vec!["us".to_string()]);
        assert_eq!(state.status_text, "ran ipsec statusall a.example.com\n");
        assert_eq!(reader.snapshot(), state);
        assert_eq!(runner.installs.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_exit_timeout_leaves_down() {
        let runner = Arc::new(FakeRunner::checks(&["no tunnels"]));
        let template = template_file();
        let controller = controller(runner.clone(), &template, 3).await;

        let err = controller
            .select_exit("acme", "b.example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SelectError::Restart(vx_core::error::RestartError::Timeout { .. })
        ));
        let state = controller.snapshot();
        assert_eq!(state.connectivity, Connectivity::Down);
        assert_eq!(state.label, "Disconnected");
        assert!(state.vendor.is_none());
    }

    #[tokio::test]
    async fn test_unknown_exit_and_vendor() {
        let runner = Arc::new(FakeRunner::default());
        let template = template_file();
        let controller = controller(runner.clone(), &template, 3).await;

        assert!(matches!(
            controller.select_exit("acme", "nowhere.example.com").await,
            Err(SelectError::ExitNotFound { .. })
        ));
        assert!(matches!(
            controller.select_exit("ghost", "a.example.com").await,
            Err(SelectError::UnknownVendor(_))
        ));
        assert!(runner.commands().is_empty());
        assert_eq!(controller.snapshot().connectivity, Connectivity::Unknown);
    }

    #[tokio::test]
    async fn test_push_failure_keeps_state() {
        let runner = Arc::new(FakeRunner::default());
        let template = template_file();
        let templates = HashMap::from([("other".to_string(), template.path().to_path_buf())]);
        let transport = RouterTransport::new(router(3), templates, runner.clone());
        let controller = SessionController::new(registry().await, transport);

        assert!(matches!(
            controller.select_exit("acme", "a.example.com").await,
            Err(SelectError::Push(_))
        ));
        assert_eq!(controller.snapshot().connectivity, Connectivity::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_aborts_selection() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]).failing("ipsec start"));
        let template = template_file();
        let controller = controller(runner.clone(), &template, 3).await;

        let err = controller
            .select_exit("acme", "a.example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SelectError::Restart(vx_core::error::RestartError::Transport(_))
        ));
        assert_eq!(runner.check_count(), 0);
        let state = controller.snapshot();
        assert_ne!(state.connectivity, Connectivity::Up);
        assert!(state.vendor.is_none());
        assert!(state.exit.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_is_not_up() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]).failing("ipsec statusall"));
        let template = template_file();
        let controller = controller(runner.clone(), &template, 3).await;

        let err = controller
            .select_exit("acme", "a.example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, SelectError::Status(_)));
        let state = controller.snapshot();
        assert_eq!(state.connectivity, Connectivity::Down);
        assert!(state.vendor.is_none());
        assert!(state.status_text.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_keeps_published_selection() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]));
        let template = template_file();
        let controller = controller(runner.clone(), &template, 3).await;

        controller.select_exit("acme", "a.example.com").await.unwrap();
        runner.fail_from_now("ipsec start");
        assert!(controller.select_exit("acme", "b.example.com").await.is_err());

        // the router was asked for the new exit, the published state keeps the old one
        let transport = controller.transport.lock().await;
        let selection = transport.selection().unwrap();
        assert_eq!(selection.exit, "b.example.com");
        assert_eq!(selection.path, vec!["eu".to_string()]);
        drop(transport);

        let state = controller.snapshot();
        assert_eq!(state.connectivity, Connectivity::Unknown);
        assert_eq!(state.vendor.as_deref(), Some("acme"));
        assert_eq!(state.exit.as_deref(), Some("a.example.com"));
        assert_eq!(state.path, vec!["us".to_string()]);
    }

    #[tokio::test]
    async fn test_check_publishes_probe() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]));
        let template = template_file();
        let controller = controller(runner, &template, 3).await;
        let mut reader = controller.reader();

        assert_eq!(controller.check().await, Connectivity::Up);
        assert!(reader.changed().await);
        assert_eq!(reader.snapshot().label, "Connected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_selections_are_serialized() {
        let runner = Arc::new(FakeRunner::checks(&["ESTABLISHED"]));
        let template = template_file();
        let controller = Arc::new(controller(runner.clone(), &template, 3).await);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_exit("acme", "a.example.com").await })
        };
        let second = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_exit("acme", "b.example.com").await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // each stop is followed by its own start before the next stop
        let lifecycle: Vec<String> = runner
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("ipsec stop") || c.starts_with("ipsec start"))
            .collect();
        assert_eq!(
            lifecycle,
            vec!["ipsec stop", "ipsec start acme", "ipsec stop", "ipsec start acme"]
        );
    }
}
