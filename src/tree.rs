use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    node::{Node, NodeId, ProjectId},
    path::PathResolver,
};

/// An in-memory view of everything stored for one project: the node records
/// plus the loaded content of every file.
///
/// Records are deduplicated by id when the tree is built. If the same id
/// shows up twice, the later record wins but keeps the position of the first.
#[derive(Debug, Clone)]
pub struct PersistedTree {
    project_id: ProjectId,
    nodes: IndexMap<NodeId, Node>,
    contents: HashMap<NodeId, String>,

    /// Children keyed by the exact `parent_id` stored on each record, which
    /// may point at a node that doesn't exist.
    children: HashMap<Option<NodeId>, Vec<NodeId>>,
}

impl PersistedTree {
    pub fn new(
        project_id: ProjectId,
        records: impl IntoIterator<Item = Node>,
        mut contents: HashMap<NodeId, String>,
    ) -> Self {
        let mut nodes = IndexMap::new();

        for node in records {
            if node.project_id != project_id {
                log::warn!(
                    "Ignoring node {} ({}) from project {} while loading project {}",
                    node.id,
                    node.name,
                    node.project_id,
                    project_id
                );
                continue;
            }

            if let Some(previous) = nodes.insert(node.id, node) {
                log::debug!("Dropping duplicate record for node {}", previous.id);
            }
        }

        contents.retain(|id, _| nodes.get(id).is_some_and(Node::is_file));

        let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
        for node in nodes.values() {
            children.entry(node.parent_id).or_default().push(node.id);
        }

        Self {
            project_id,
            nodes,
            contents,
            children,
        }
    }

    pub fn empty(project_id: ProjectId) -> Self {
        Self::new(project_id, Vec::new(), HashMap::new())
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// All records, in store order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn files(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.is_file())
    }

    pub fn folders(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.is_folder())
    }

    /// The loaded content of a file. Files without content read as empty.
    pub fn content(&self, id: NodeId) -> &str {
        self.contents.get(&id).map(String::as_str).unwrap_or("")
    }

    /// Ids of the records whose `parent_id` is exactly `parent`.
    pub fn children(&self, parent: Option<NodeId>) -> &[NodeId] {
        self.children
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn path_resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self.nodes.values())
    }
}


#[cfg(test)]
mod test {
    use super::test_util::TreeBuilder;
    use super::*;

    #[test]
    fn duplicate_records_keep_first_position() {
        let mut builder = TreeBuilder::new();
        let a = builder.file(None, "a.js", "a");
        builder.file(None, "b.js", "b");

        let mut tree = builder.build();
        let mut renamed = tree.get(a).unwrap().clone();
        renamed.name = "renamed.js".to_owned();
        builder.push_node(renamed);
        tree = builder.build();

        let names: Vec<&str> = tree.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["renamed.js", "b.js"]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn foreign_records_are_ignored() {
        let mut builder = TreeBuilder::new();
        builder.file(None, "mine.js", "x");
        let mut tree_nodes: Vec<Node> = builder.build().nodes().cloned().collect();

        let mut foreign = tree_nodes[0].clone();
        foreign.id = NodeId::new();
        foreign.project_id = ProjectId::new();
        tree_nodes.push(foreign);

        let tree = PersistedTree::new(builder.project_id, tree_nodes, HashMap::new());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn missing_content_reads_empty() {
        let mut builder = TreeBuilder::new();
        let folder = builder.folder(None, "src");
        let file = builder.file(Some(folder), "a.js", "hello");
        let tree = builder.build();

        assert_eq!(tree.content(file), "hello");
        assert_eq!(tree.content(folder), "");
        assert_eq!(tree.children(Some(folder)), &[file]);
    }
}
