//! vx-directory: Hierarchical VPN server directory
//!
//! Each configured vendor organizes its servers under zero to five
//! hierarchy levels (region, city, ...). This crate turns that
//! configuration into an immutable [`Node`] tree per vendor, optionally
//! resolving hostnames while doing so, answers "where in the tree is this
//! exit" queries, and keeps the trees fresh from a background task that
//! publishes each rebuilt tree with a single reference swap.

pub mod builder;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod search;

pub use builder::{DirectoryBuilder, ServerEntry, VendorDirectory};
pub use node::{Node, NodeKind, NodeView};
pub use registry::{bootstrap, DirectoryRefresher, DirectoryRegistry};
pub use resolver::{HostLookup, ResolvedEndpoints, Resolver, SystemLookup};
pub use search::find_path;
