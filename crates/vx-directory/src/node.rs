//! Directory tree node
//!
//! A node starts out [`Node::Undefined`] and commits to being either a list
//! of endpoints or a keyed map of child nodes on its first write. Writing the
//! other kind afterwards is a [`DirectoryError::TypeConflict`] and leaves the
//! node untouched.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use vx_core::error::{ConfigError, DirectoryError};

/// One node of a vendor's server tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Node {
    /// Not written yet
    #[default]
    Undefined,
    /// Endpoint identifiers, in configuration order
    List(Vec<String>),
    /// Child nodes keyed by level value (e.g. region name)
    Map(HashMap<String, Node>),
}

/// Which variant a node holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Undefined,
    List,
    Map,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Undefined => "undefined",
            NodeKind::List => "list",
            NodeKind::Map => "map",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of a node's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeView<'a> {
    /// The node was never written
    Empty,
    List(&'a [String]),
    Map(&'a HashMap<String, Node>),
}

impl Node {
    /// A map node with no children yet
    pub fn empty_map() -> Self {
        Node::Map(HashMap::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Undefined => NodeKind::Undefined,
            Node::List(_) => NodeKind::List,
            Node::Map(_) => NodeKind::Map,
        }
    }

    /// Current kind and payload; an undefined node reads as [`NodeView::Empty`]
    pub fn read(&self) -> NodeView<'_> {
        match self {
            Node::Undefined => NodeView::Empty,
            Node::List(list) => NodeView::List(list),
            Node::Map(map) => NodeView::Map(map),
        }
    }

    /// Replace the endpoint list
    pub fn set_list(&mut self, endpoints: Vec<String>) -> Result<(), DirectoryError> {
        self.ensure(NodeKind::List)?;
        *self = Node::List(endpoints);
        Ok(())
    }

    /// Append endpoints to the list
    pub fn append_list(&mut self, endpoints: Vec<String>) -> Result<(), DirectoryError> {
        self.ensure(NodeKind::List)?;
        match self {
            Node::List(list) => list.extend(endpoints),
            _ => *self = Node::List(endpoints),
        }
        Ok(())
    }

    /// Attach `child` under `key`, replacing any previous child with that key
    pub fn set_map(&mut self, key: impl Into<String>, child: Node) -> Result<(), DirectoryError> {
        self.ensure(NodeKind::Map)?;
        if let Node::Undefined = self {
            *self = Node::empty_map();
        }
        if let Node::Map(map) = self {
            map.insert(key.into(), child);
        }
        Ok(())
    }

    /// Child under `key`, when this is a map
    pub fn child(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Node reached by following `path` from here
    pub fn walk<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, key| node.child(key.as_ref()))
    }

    /// Mutable node reached by following `path` from here
    pub fn walk_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Node> {
        let mut node = self;
        for key in path {
            node = match node {
                Node::Map(map) => map.get_mut(key.as_ref())?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Endpoints when this is a list
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Node::List(list) => Some(list),
            _ => None,
        }
    }

    /// Child keys of the map at `path`, sorted
    pub fn keys_at<S: AsRef<str>>(&self, path: &[S]) -> Result<Vec<String>, ConfigError> {
        match self.walk(path).map(Node::read) {
            Some(NodeView::Map(map)) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                Ok(keys)
            }
            Some(NodeView::List(_)) | Some(NodeView::Empty) => Ok(Vec::new()),
            None => Err(ConfigError::Invalid(format!("Invalid path: {}", join(path)))),
        }
    }

    /// Endpoint list at `path`
    pub fn servers_at<S: AsRef<str>>(&self, path: &[S]) -> Result<&[String], ConfigError> {
        self.walk(path).and_then(Node::as_list).ok_or_else(|| {
            ConfigError::Invalid(format!("Unable to locate servers at: {}", join(path)))
        })
    }

    /// Indented outline with map keys sorted lexicographically
    pub fn render_outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(&mut out, 0);
        out
    }

    fn outline_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Node::Undefined => {}
            Node::List(list) => {
                for server in list {
                    out.push_str(&format!("{}- {}\n", indent, server));
                }
            }
            Node::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    out.push_str(&format!("{}{}:\n", indent, key));
                    map[key].outline_into(out, depth + 1);
                }
            }
        }
    }

    fn ensure(&self, wanted: NodeKind) -> Result<(), DirectoryError> {
        let existing = self.kind();
        if existing == NodeKind::Undefined || existing == wanted {
            Ok(())
        } else {
            Err(DirectoryError::TypeConflict {
                existing: existing.as_str(),
                attempted: wanted.as_str(),
            })
        }
    }
}

fn join<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(".")
}
