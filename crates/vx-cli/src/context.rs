//! Shared setup for commands: configuration, directories and router

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use vx_core::config::{self, AppConfig, TomlConfig};
use vx_directory::{bootstrap, DirectoryRefresher, DirectoryRegistry, Resolver};
use vx_router::{vendor_templates, RouterTransport, SessionController};

/// Loaded configuration in both its dotted-path and typed forms
pub struct Context {
    pub config: Arc<TomlConfig>,
    pub app: AppConfig,
}

impl Context {
    /// Load `path`, or search the default locations when it is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => config::load_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => config::discover_config().context("Failed to load config")?,
        };
        let app = config.app().context("Invalid configuration")?;
        Ok(Self {
            config: Arc::new(config),
            app,
        })
    }

    /// Build every vendor directory once
    pub async fn directories(&self) -> Result<(DirectoryRegistry, DirectoryRefresher)> {
        let interval = self.app.effective_refresh_interval();
        let (registry, refresher) = bootstrap(
            self.config.clone(),
            &self.app.vendors,
            Resolver::system(),
            interval,
        )
        .await
        .context("Failed to load server directories")?;
        Ok((registry, refresher))
    }

    /// Router transport for the configured mode
    pub fn transport(&self) -> Result<RouterTransport> {
        let templates = vendor_templates(&*self.config, &self.app.vendors);
        RouterTransport::from_config(self.app.router.clone(), templates)
            .context("Invalid router configuration")
    }

    /// Controller over freshly built directories
    pub async fn controller(&self) -> Result<SessionController> {
        let (registry, _refresher) = self.directories().await?;
        Ok(SessionController::new(registry, self.transport()?))
    }
}
