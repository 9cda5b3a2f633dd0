//! Canonical paths for nodes in a parent-linked tree.

use std::collections::{HashMap, HashSet};

use crate::node::{Node, NodeId};

/// Parent walks longer than this are treated as corrupt.
pub const MAX_DEPTH: usize = 256;

/// Computes canonical `/`-separated paths from `parent_id` links.
///
/// Building the resolver indexes every node by id once, so each lookup costs
/// O(depth). Resolution never fails: a dangling parent makes the walk stop
/// there, as if the node below it sat at the root, and a cycle or an overly
/// deep chain yields `/<name>`.
pub struct PathResolver<'a> {
    nodes: HashMap<NodeId, &'a Node>,
}

impl<'a> PathResolver<'a> {
    pub fn new(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|node| (node.id, node)).collect(),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&'a Node> {
        self.nodes.get(&id).copied()
    }

    pub fn resolve(&self, node: &Node) -> String {
        let mut names = vec![node.name.as_str()];
        let mut seen = HashSet::new();
        seen.insert(node.id);

        let mut current = node.parent_id;
        while let Some(parent_id) = current {
            if names.len() > MAX_DEPTH || !seen.insert(parent_id) {
                log::warn!(
                    "Parent chain of node {} ({}) loops or is too deep, placing it at the root",
                    node.id,
                    node.name
                );
                return format!("/{}", node.name);
            }

            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    names.push(parent.name.as_str());
                    current = parent.parent_id;
                }
                None => {
                    log::debug!(
                        "Node {} points at missing parent {}, treating it as root-level",
                        names.last().copied().unwrap_or_default(),
                        parent_id
                    );
                    break;
                }
            }
        }

        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        path
    }

    pub fn resolve_id(&self, id: NodeId) -> Option<String> {
        self.get(id).map(|node| self.resolve(node))
    }

    /// Tells whether `ancestor` appears in the parent chain of `id`, or is
    /// `id` itself.
    pub fn is_same_or_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            if current_id == ancestor {
                return true;
            }
            if !seen.insert(current_id) || seen.len() > MAX_DEPTH {
                return false;
            }
            current = self.get(current_id).and_then(|node| node.parent_id);
        }

        false
    }
}

/// Normalizes a snapshot path: exactly one leading slash, no empty segments,
/// no trailing slash. The root normalizes to `/`.
///
/// Segments are trimmed the same way stored names are, so a path always
/// compares equal to the path of the record it produces.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
    {
        normalized.push('/');
        normalized.push_str(segment);
    }

    if normalized.is_empty() {
        normalized.push('/');
    }

    normalized
}

/// Splits a path into its directory segments and its final name. Returns
/// `None` for the root.
pub fn split_path(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let name = segments.pop()?;
    Some((segments, name))
}

pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}
