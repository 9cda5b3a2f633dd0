//! Editor-facing views of a stored project.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    node::{NodeId, NodeKind},
    path::join_path,
    project::slugify,
    snapshot::{DesiredSnapshot, PLACEHOLDER_CONTENT, PLACEHOLDER_NAME},
    tree::PersistedTree,
};

/// One node in the hierarchical view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub path: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeItem>,
}

/// A stored project as the editing surface sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Root-level items, folders first, then by name.
    pub hierarchy: Vec<TreeItem>,

    /// `path -> content` for every file, in hierarchy order. Empty folders
    /// get a hidden placeholder entry so they stay visible.
    pub files: IndexMap<String, String>,
}

impl Projection {
    /// The flat map as a desired snapshot. Feeding it back into the
    /// reconciler changes nothing.
    pub fn to_snapshot(&self) -> DesiredSnapshot {
        self.files
            .iter()
            .map(|(path, content)| (path.as_str(), content.clone()))
            .collect()
    }

    /// Replaces a root `package.json` that isn't valid JSON with a minimal
    /// manifest, so the editing surface can still boot the project.
    ///
    /// Returns whether anything was replaced.
    pub fn repair_manifest(&mut self, project_name: &str) -> bool {
        let Some(content) = self.files.get_mut("/package.json") else {
            return false;
        };

        if serde_json::from_str::<serde_json::Value>(content).is_ok() {
            return false;
        }

        log::warn!("package.json is not valid JSON, substituting a default manifest");
        *content = default_manifest(project_name);
        true
    }

    /// Every node id in the hierarchy, depth first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack: Vec<&TreeItem> = self.hierarchy.iter().rev().collect();
        while let Some(item) = stack.pop() {
            ids.push(item.id);
            stack.extend(item.children.iter().rev());
        }
        ids
    }
}

pub fn default_manifest(project_name: &str) -> String {
    let name = match slugify(project_name) {
        slug if slug.is_empty() => "project".to_owned(),
        slug => slug,
    };

    let manifest = serde_json::json!({
        "name": name,
        "version": "1.0.0",
        "dependencies": {
            "react": "^18.2.0",
            "react-dom": "^18.2.0",
        },
    });

    // Serializing a `Value` can't fail.
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

/// Builds both views of a stored tree.
///
/// Nodes whose parent is missing, or is a file, are shown at the root. Nodes
/// that can't be reached from the root because their parent links loop are
/// listed one by one at the root, under the same `/<name>` path the
/// [`PathResolver`](crate::path::PathResolver) gives them.
pub fn project(tree: &PersistedTree) -> Projection {
    let mut visited = HashSet::new();

    let mut roots: Vec<NodeId> = tree
        .nodes()
        .filter(|node| match node.parent_id {
            None => true,
            Some(parent) => !tree.get(parent).is_some_and(|p| p.is_folder()),
        })
        .map(|node| node.id)
        .collect();
    sort_siblings(tree, &mut roots);

    let mut hierarchy: Vec<TreeItem> = roots
        .into_iter()
        .map(|id| build_item(tree, id, "/", &mut visited))
        .collect();

    let stranded: Vec<NodeId> = tree
        .nodes()
        .map(|node| node.id)
        .filter(|id| !visited.contains(id))
        .collect();

    let resolver = tree.path_resolver();
    for id in stranded {
        let Some(node) = tree.get(id) else {
            continue;
        };
        log::warn!("Node {} is part of a parent cycle, showing it at the root", id);
        hierarchy.push(TreeItem {
            id,
            name: node.name.clone(),
            kind: node.kind,
            path: resolver.resolve(node),
            children: Vec::new(),
        });
    }

    let mut files = IndexMap::new();
    let mut stack: Vec<&TreeItem> = hierarchy.iter().rev().collect();
    while let Some(item) = stack.pop() {
        match item.kind {
            NodeKind::File => {
                files.insert(item.path.clone(), tree.content(item.id).to_owned());
            }
            NodeKind::Folder if item.children.is_empty() => {
                files.insert(
                    join_path(&item.path, PLACEHOLDER_NAME),
                    PLACEHOLDER_CONTENT.to_owned(),
                );
            }
            NodeKind::Folder => {
                stack.extend(item.children.iter().rev());
            }
        }
    }

    Projection { hierarchy, files }
}

fn sort_siblings(tree: &PersistedTree, ids: &mut [NodeId]) {
    ids.sort_by(|a, b| {
        let (Some(a), Some(b)) = (tree.get(*a), tree.get(*b)) else {
            return std::cmp::Ordering::Equal;
        };
        b.is_folder()
            .cmp(&a.is_folder())
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn build_item(
    tree: &PersistedTree,
    id: NodeId,
    parent_path: &str,
    visited: &mut HashSet<NodeId>,
) -> TreeItem {
    visited.insert(id);

    let (name, kind) = match tree.get(id) {
        Some(node) => (node.name.clone(), node.kind),
        None => (String::new(), NodeKind::File),
    };
    let path = join_path(parent_path, &name);

    let mut children = Vec::new();
    if kind.is_folder() {
        let mut child_ids: Vec<NodeId> = tree
            .children(Some(id))
            .iter()
            .copied()
            .filter(|child| !visited.contains(child))
            .collect();
        sort_siblings(tree, &mut child_ids);

        for child in child_ids {
            if !visited.contains(&child) {
                children.push(build_item(tree, child, &path, visited));
            }
        }
    }

    TreeItem {
        id,
        name,
        kind,
        path,
        children,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tree::test_util::TreeBuilder;

    fn outline(items: &[TreeItem], depth: usize, out: &mut String) {
        for item in items {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&item.name);
            if item.kind.is_folder() {
                out.push('/');
            }
            out.push('\n');
            outline(&item.children, depth + 1, out);
        }
    }

    #[test]
    fn folders_first_then_case_sensitive_names() {
        let mut builder = TreeBuilder::new();
        builder.file(None, "b.js", "b");
        builder.file(None, "A.js", "a");
        let src = builder.folder(None, "src");
        builder.file(Some(src), "index.js", "i");
        builder.folder(None, "Assets");
        builder.file(None, "a.js", "a2");

        let projection = project(&builder.build());
        let mut out = String::new();
        outline(&projection.hierarchy, 0, &mut out);

        insta::assert_snapshot!(out.trim_end(), @r"
        Assets/
        src/
          index.js
        A.js
        a.js
        b.js
        ");
    }

    #[test]
    fn flat_map_has_placeholders_for_empty_folders() {
        let mut builder = TreeBuilder::new();
        let src = builder.folder(None, "src");
        builder.file(Some(src), "App.js", "app");
        let empty = builder.folder(Some(src), "empty");
        builder.folder(Some(empty), "deeper");
        builder.file(None, "index.js", "index");

        let projection = project(&builder.build());
        let entries: Vec<(&str, &str)> = projection
            .files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
            .collect();

        assert_eq!(
            entries,
            vec![
                ("/src/empty/deeper/.tempdata", PLACEHOLDER_CONTENT),
                ("/src/App.js", "app"),
                ("/index.js", "index"),
            ]
        );
    }

    #[test]
    fn orphans_and_cycles_are_shown_at_the_root() {
        let mut builder = TreeBuilder::new();
        let orphan = builder.file(Some(NodeId::new()), "orphan.js", "o");
        let a = builder.folder(None, "a");
        let b = builder.folder(Some(a), "b");
        let mut looped = builder.build().get(a).unwrap().clone();
        looped.parent_id = Some(b);
        builder.push_node(looped);
        let tree = builder.build();

        let projection = project(&tree);
        let mut ids = projection.ids();
        ids.sort();
        let mut expected = vec![orphan, a, b];
        expected.sort();
        assert_eq!(ids, expected);

        assert!(projection.files.contains_key("/orphan.js"));
    }

    #[test]
    fn stranded_nodes_match_resolved_paths() {
        let mut builder = TreeBuilder::new();
        let a = builder.folder(None, "a");
        let b = builder.folder(Some(a), "b");
        let file = builder.file(Some(b), "f.js", "f");
        let mut looped = builder.build().get(a).unwrap().clone();
        looped.parent_id = Some(b);
        builder.push_node(looped);
        let tree = builder.build();

        let projection = project(&tree);
        let paths: Vec<&str> = projection.files.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/a/.tempdata", "/b/.tempdata", "/f.js"]);
        assert!(projection.hierarchy.iter().all(|item| item.children.is_empty()));

        let resolved = tree.path_resolver().resolve_id(file).unwrap();
        assert_eq!(projection.files.get(&resolved).map(String::as_str), Some("f"));
    }

    #[test]
    fn invalid_manifest_is_replaced() {
        let mut builder = TreeBuilder::new();
        builder.file(None, "package.json", "{ broken");
        let mut projection = project(&builder.build());

        assert!(projection.repair_manifest("My App"));
        let manifest: serde_json::Value =
            serde_json::from_str(&projection.files["/package.json"]).unwrap();
        assert_eq!(manifest["name"], "my-app");
        assert_eq!(manifest["dependencies"]["react"], "^18.2.0");

        assert!(!projection.repair_manifest("My App"));
    }

    #[test]
    fn snapshot_round_trip_keeps_order() {
        let mut builder = TreeBuilder::new();
        let lib = builder.folder(None, "lib");
        builder.file(Some(lib), "util.js", "u");
        builder.file(None, "main.js", "m");

        let snapshot = project(&builder.build()).to_snapshot();
        let paths: Vec<&str> = snapshot.iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["/lib/util.js", "/main.js"]);
    }
}
