//! Exit lookup by depth-first search

use crate::node::Node;

/// Keys leading from `root` to the list that contains `target`
///
/// Children are visited in the map's iteration order and the first match
/// wins. An empty path means `root` itself is the list. Returns `None` when
/// no list anywhere below `root` contains `target`.
pub fn find_path(root: &Node, target: &str) -> Option<Vec<String>> {
    let mut path = search(root, target)?;
    path.reverse();
    Some(path)
}

/// Collects keys leaf-first while unwinding
fn search(node: &Node, target: &str) -> Option<Vec<String>> {
    match node {
        Node::Undefined => None,
        Node::List(list) => list.iter().any(|s| s == target).then(Vec::new),
        Node::Map(map) => map.iter().find_map(|(key, child)| {
            let mut path = search(child, target)?;
            path.push(key.clone());
            Some(path)
        }),
    }
}
