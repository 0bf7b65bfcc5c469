//! Builds a vendor's server tree from configuration
//!
//! The configuration for a vendor looks like:
//!
//! ```toml
//! [acme]
//! levels = ["region", "city"]
//! resolve_servers = true
//!
//! [acme.servers.us]
//! Denver = ["den1.acme.net", "den2.acme.net"]
//! ```
//!
//! Each declared level becomes one layer of map nodes; the level below the
//! last one holds the server lists. With zero levels `servers` is itself the
//! list. When `resolve_servers` is set, every leaf list is replaced by the
//! addresses its identifiers resolve to.

use serde::Serialize;
use std::time::Instant;

use vx_core::config::{ConfigSource, ValueKind, MAX_LEVELS};
use vx_core::error::{ConfigError, DirectoryError};

use crate::node::Node;
use crate::resolver::{ResolvedEndpoints, Resolver};
use crate::search;

/// Config path segments ahead of the first level key (`<vendor>.servers`)
const SERVERS_PREFIX: usize = 2;

/// A vendor's fully built server tree
#[derive(Debug, Clone, Serialize)]
pub struct VendorDirectory {
    /// Vendor name
    pub name: String,
    /// Hierarchy level labels, outermost first
    pub levels: Vec<String>,
    /// Whether leaf lists hold resolved addresses
    pub resolve: bool,
    /// Tree root
    pub root: Node,
    /// Identifier to addresses, filled only when `resolve` is set
    #[serde(skip_serializing_if = "ResolvedEndpoints::is_empty")]
    pub resolved: ResolvedEndpoints,
}

/// A configured server and the addresses it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerEntry {
    pub name: String,
    pub addresses: Vec<String>,
}

impl VendorDirectory {
    /// Keys from the root to the list containing `exit`
    pub fn find_path(&self, exit: &str) -> Option<Vec<String>> {
        search::find_path(&self.root, exit)
    }

    /// Server list at `path`
    pub fn servers_at<S: AsRef<str>>(&self, path: &[S]) -> Result<&[String], ConfigError> {
        self.root.servers_at(path)
    }

    /// Child keys at `path`, sorted
    pub fn keys_at<S: AsRef<str>>(&self, path: &[S]) -> Result<Vec<String>, ConfigError> {
        self.root.keys_at(path)
    }

    /// Servers at `path` with their addresses
    ///
    /// Unresolved leaves hold the configured identifiers, each standing for
    /// itself. Resolved leaves hold addresses; those are grouped back under
    /// the identifiers that produced them, in leaf order.
    pub fn server_entries<S: AsRef<str>>(
        &self,
        path: &[S],
    ) -> Result<Vec<ServerEntry>, ConfigError> {
        let servers = self.servers_at(path)?;
        if !self.resolve {
            return Ok(servers
                .iter()
                .map(|server| ServerEntry {
                    name: server.clone(),
                    addresses: vec![server.clone()],
                })
                .collect());
        }

        let mut entries: Vec<ServerEntry> = Vec::new();
        for address in servers {
            let mut owners: Vec<&String> = self
                .resolved
                .iter()
                .filter(|(_, addrs)| addrs.contains(address))
                .map(|(identifier, _)| identifier)
                .collect();
            owners.sort();
            if owners.is_empty() {
                owners.push(address);
            }
            for owner in owners {
                match entries.iter_mut().find(|entry| &entry.name == owner) {
                    Some(entry) => entry.addresses.push(address.clone()),
                    None => entries.push(ServerEntry {
                        name: owner.clone(),
                        addresses: vec![address.clone()],
                    }),
                }
            }
        }
        Ok(entries)
    }

    /// Text outline of the tree, keys sorted
    pub fn render_outline(&self) -> String {
        self.root.render_outline()
    }

    /// Number of endpoints across all leaf lists
    pub fn endpoint_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Undefined => 0,
                Node::List(list) => list.len(),
                Node::Map(map) => map.values().map(count).sum(),
            }
        }
        count(&self.root)
    }
}

/// Walks vendor configuration into [`VendorDirectory`] trees
pub struct DirectoryBuilder<'a> {
    config: &'a dyn ConfigSource,
    resolver: &'a Resolver,
}

impl<'a> DirectoryBuilder<'a> {
    pub fn new(config: &'a dyn ConfigSource, resolver: &'a Resolver) -> Self {
        Self { config, resolver }
    }

    /// Build the tree for `vendor`
    pub async fn build(&self, vendor: &str) -> Result<VendorDirectory, DirectoryError> {
        let begin = Instant::now();
        tracing::info!("Loading: {}", vendor);

        if !self.config.exists(vendor) {
            return Err(ConfigError::UnknownVendor(vendor.to_string()).into());
        }
        let servers_path = format!("{}.servers", vendor);
        if !self.config.exists(&servers_path) {
            return Err(ConfigError::MissingField(servers_path).into());
        }

        let levels = self.config.string_list(&format!("{}.levels", vendor));
        if levels.len() > MAX_LEVELS {
            return Err(ConfigError::UnsupportedDepth {
                vendor: vendor.to_string(),
                levels: levels.len(),
                max: MAX_LEVELS,
            }
            .into());
        }
        let resolve = self.config.bool(&format!("{}.resolve_servers", vendor));

        let mut leaves = Vec::new();
        let mut segments = vec![vendor.to_string(), "servers".to_string()];
        let mut root = self.build_node(&mut segments, &levels, &mut leaves)?;

        let mut resolved = ResolvedEndpoints::new();
        if resolve {
            for leaf in &leaves {
                let node = root.walk_mut(leaf).ok_or_else(|| {
                    ConfigError::Invalid(format!("{}: lost leaf {}", vendor, leaf.join(".")))
                })?;
                let identifiers = node.as_list().map(<[String]>::to_vec).unwrap_or_default();
                let addresses = self.resolve_leaf(&identifiers, &mut resolved).await;
                node.set_list(addresses)?;
            }
        }

        tracing::info!(
            "Finished loading {} in {:.2}sec",
            vendor,
            begin.elapsed().as_secs_f64()
        );

        Ok(VendorDirectory {
            name: vendor.to_string(),
            levels,
            resolve,
            root,
            resolved,
        })
    }

    /// One map layer per remaining level, then the server list
    ///
    /// `segments` is the config path of the current node: vendor, `servers`,
    /// then one key per level already walked.
    fn build_node(
        &self,
        segments: &mut Vec<String>,
        levels: &[String],
        leaves: &mut Vec<Vec<String>>,
    ) -> Result<Node, DirectoryError> {
        let kind = self
            .config
            .kind_at(segments)
            .ok_or_else(|| ConfigError::MissingField(segments.join(".")))?;

        let Some((level, deeper)) = levels.split_first() else {
            if kind == ValueKind::Table {
                return Err(ConfigError::Invalid(format!(
                    "{}: expected a server list, found a table",
                    segments.join(".")
                ))
                .into());
            }
            let mut node = Node::default();
            node.set_list(self.config.string_list_at(segments))?;
            leaves.push(segments[SERVERS_PREFIX..].to_vec());
            return Ok(node);
        };

        if kind != ValueKind::Table {
            return Err(ConfigError::Invalid(format!(
                "{}: expected a table of {}, found a {}",
                segments.join("."),
                level,
                kind.label()
            ))
            .into());
        }

        let mut node = Node::empty_map();
        for key in self.config.map_keys_at(segments) {
            segments.push(key.clone());
            let child = self.build_node(segments, deeper, leaves)?;
            segments.pop();
            node.set_map(key, child)?;
        }
        Ok(node)
    }

    /// Addresses for a leaf's identifiers, in order, without duplicates
    async fn resolve_leaf(
        &self,
        identifiers: &[String],
        resolved: &mut ResolvedEndpoints,
    ) -> Vec<String> {
        let mut addresses: Vec<String> = Vec::new();
        for identifier in identifiers {
            let addrs = self.resolver.resolve(identifier).await;
            for addr in &addrs {
                if !addresses.contains(addr) {
                    addresses.push(addr.clone());
                }
            }
            if !addrs.is_empty() {
                resolved.insert(identifier.clone(), addrs);
            }
        }
        addresses
    }
}
