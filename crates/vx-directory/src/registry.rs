//! Per-vendor directory registry and background refresh
//!
//! Every vendor tree lives behind a `watch` channel. Readers clone the
//! current `Arc<VendorDirectory>` and never see a partially built tree; the
//! refresher is the only writer and replaces a tree wholesale once its
//! rebuild has finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use vx_core::config::ConfigSource;
use vx_core::error::DirectoryError;

use crate::builder::{DirectoryBuilder, VendorDirectory};
use crate::resolver::Resolver;

/// Build every vendor once and return the registry plus its refresher
///
/// Any vendor that fails here aborts startup; later refresh failures only
/// keep the previous tree.
pub async fn bootstrap(
    config: Arc<dyn ConfigSource>,
    vendors: &[String],
    resolver: Resolver,
    interval: Duration,
) -> Result<(DirectoryRegistry, DirectoryRefresher), DirectoryError> {
    let mut receivers = HashMap::with_capacity(vendors.len());
    let mut senders = Vec::with_capacity(vendors.len());
    let mut order = Vec::with_capacity(vendors.len());

    {
        let builder = DirectoryBuilder::new(&*config, &resolver);
        for vendor in vendors {
            if receivers.contains_key(vendor) {
                tracing::warn!("Vendor {} listed more than once", vendor);
                continue;
            }
            let directory = builder.build(vendor).await?;
            let (tx, rx) = watch::channel(Arc::new(directory));
            receivers.insert(vendor.clone(), rx);
            senders.push((vendor.clone(), tx));
            order.push(vendor.clone());
        }
    }

    let registry = DirectoryRegistry {
        directories: Arc::new(receivers),
        order: Arc::new(order),
    };
    let refresher = DirectoryRefresher {
        config,
        resolver,
        interval,
        senders,
    };
    Ok((registry, refresher))
}

/// Read side of the vendor trees
#[derive(Clone)]
pub struct DirectoryRegistry {
    directories: Arc<HashMap<String, watch::Receiver<Arc<VendorDirectory>>>>,
    order: Arc<Vec<String>>,
}

impl DirectoryRegistry {
    /// Current tree for `vendor`
    pub fn get(&self, vendor: &str) -> Option<Arc<VendorDirectory>> {
        self.directories
            .get(vendor)
            .map(|rx| Arc::clone(&rx.borrow()))
    }

    /// Vendor names in configuration order
    pub fn vendors(&self) -> &[String] {
        &self.order
    }

    /// Change notifications for `vendor`'s tree
    pub fn subscribe(&self, vendor: &str) -> Option<watch::Receiver<Arc<VendorDirectory>>> {
        self.directories.get(vendor).cloned()
    }
}

impl std::fmt::Debug for DirectoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryRegistry")
            .field("vendors", &self.order)
            .finish()
    }
}

/// Write side: rebuilds every tree on a fixed interval
pub struct DirectoryRefresher {
    config: Arc<dyn ConfigSource>,
    resolver: Resolver,
    interval: Duration,
    senders: Vec<(String, watch::Sender<Arc<VendorDirectory>>)>,
}

impl DirectoryRefresher {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Rebuild every vendor once, returning how many trees were replaced
    pub async fn refresh_once(&self) -> usize {
        let builder = DirectoryBuilder::new(&*self.config, &self.resolver);
        let mut replaced = 0;

        for (vendor, tx) in &self.senders {
            match builder.build(vendor).await {
                Ok(directory) => {
                    tx.send_replace(Arc::new(directory));
                    replaced += 1;
                }
                Err(e) => {
                    tracing::warn!("Keeping previous {} directory: {}", vendor, e);
                }
            }
        }
        replaced
    }

    /// Refresh until `cancel` fires; the first rebuild happens one interval in
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Starting directory refresh task (interval: {:?}, vendors: {})",
            self.interval,
            self.senders.len()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let replaced = self.refresh_once().await;
                    tracing::debug!("Refreshed {}/{} directories", replaced, self.senders.len());
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Directory refresh task shutting down");
                    break;
                }
            }
        }
    }
}
