//! Hostname resolution for directory builds
//!
//! Lookups go through [`HostLookup`] so builds can run against the system
//! resolver in production and an in-memory table in tests. Resolution
//! failures never abort a build: the identifier is dropped (hostnames) or
//! kept verbatim (dotted-quad shaped strings) and a warning is logged.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use vx_core::error::ResolutionError;

/// Configured identifier to the addresses it resolved to
pub type ResolvedEndpoints = HashMap<String, Vec<String>>;

/// Name to address lookup
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// All addresses for `host`
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Lookup through the operating system resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let mut addrs: Vec<IpAddr> = Vec::new();
        for addr in tokio::net::lookup_host((host, 0)).await? {
            if !addrs.contains(&addr.ip()) {
                addrs.push(addr.ip());
            }
        }
        Ok(addrs)
    }
}

/// Turns server identifiers into address strings
#[derive(Clone)]
pub struct Resolver {
    lookup: Arc<dyn HostLookup>,
    /// Keep dotted-quad shaped identifiers whose lookup failed
    retain_ip_shaped: bool,
}

impl Resolver {
    /// Resolver backed by `lookup`
    pub fn new(lookup: Arc<dyn HostLookup>) -> Self {
        Self {
            lookup,
            retain_ip_shaped: true,
        }
    }

    /// Resolver backed by the system resolver
    pub fn system() -> Self {
        Self::new(Arc::new(SystemLookup))
    }

    /// Drop dotted-quad shaped identifiers that fail to resolve instead of keeping them
    pub fn drop_failed_ip_shaped(mut self) -> Self {
        self.retain_ip_shaped = false;
        self
    }

    /// Single lookup attempt, no fallback
    pub async fn try_resolve(&self, identifier: &str) -> Result<Vec<String>, ResolutionError> {
        if is_ip_literal(identifier) {
            return Ok(vec![identifier.to_string()]);
        }
        let addrs = self
            .lookup
            .lookup(identifier)
            .await
            .map_err(|source| ResolutionError {
                host: identifier.to_string(),
                source,
            })?;
        Ok(addrs.iter().map(IpAddr::to_string).collect())
    }

    /// Addresses for `identifier`, empty when it is dropped
    ///
    /// IP literals come back unchanged without a lookup.
    pub async fn resolve(&self, identifier: &str) -> Vec<String> {
        match self.try_resolve(identifier).await {
            Ok(addrs) => addrs,
            Err(e) if self.retain_ip_shaped && is_ip_shaped(identifier) => {
                tracing::warn!("{}; keeping {} as-is", e, identifier);
                vec![identifier.to_string()]
            }
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Resolve each identifier in turn
    ///
    /// Lookups are sequential: the platform resolver is not assumed to be
    /// safe for concurrent use.
    pub async fn resolve_all(&self, identifiers: &[String]) -> ResolvedEndpoints {
        let mut resolved = ResolvedEndpoints::with_capacity(identifiers.len());
        for identifier in identifiers {
            let addrs = self.resolve(identifier).await;
            if !addrs.is_empty() {
                resolved.insert(identifier.clone(), addrs);
            }
        }
        resolved
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("retain_ip_shaped", &self.retain_ip_shaped)
            .finish_non_exhaustive()
    }
}

/// Parses as an IPv4 or IPv6 address
pub fn is_ip_literal(identifier: &str) -> bool {
    identifier.parse::<IpAddr>().is_ok()
}

/// Four dot separated digit groups, whether or not they form a valid address
pub fn is_ip_shaped(identifier: &str) -> bool {
    let parts: Vec<&str> = identifier.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}
