//! Lookup tables that let the reconciler recognize stored files by path or
//! by a prefix of their content.

use std::collections::HashMap;

use crate::{node::NodeId, snapshot::is_placeholder_path, tree::PersistedTree};

/// Number of characters of content that make up a fingerprint.
pub const FINGERPRINT_LEN: usize = 200;

/// The first `FINGERPRINT_LEN` characters of `content`.
pub fn fingerprint(content: &str) -> &str {
    match content.char_indices().nth(FINGERPRINT_LEN) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

/// Path and fingerprint lookups over the files of a [`PersistedTree`].
///
/// Stored placeholders are left out entirely, since they are always deleted.
/// Only files with non-empty content get a fingerprint.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    by_path: HashMap<String, NodeId>,
    by_fingerprint: HashMap<String, Vec<NodeId>>,
    paths: HashMap<NodeId, String>,
}

impl FingerprintIndex {
    pub fn build(tree: &PersistedTree) -> Self {
        let resolver = tree.path_resolver();
        let mut index = FingerprintIndex::default();

        for node in tree.files() {
            if is_placeholder_path(&node.name) {
                continue;
            }

            let path = resolver.resolve(node);

            if let Some(&existing) = index.by_path.get(&path) {
                log::warn!(
                    "Nodes {} and {} both resolve to {}, keeping {}",
                    existing,
                    node.id,
                    path,
                    existing
                );
            } else {
                index.by_path.insert(path.clone(), node.id);
            }

            let content = tree.content(node.id);
            if !content.is_empty() {
                index
                    .by_fingerprint
                    .entry(fingerprint(content).to_owned())
                    .or_default()
                    .push(node.id);
            }

            index.paths.insert(node.id, path);
        }

        log::trace!(
            "Indexed {} path(s) and {} fingerprint(s)",
            index.by_path.len(),
            index.by_fingerprint.len()
        );

        index
    }

    pub fn by_path(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    /// Files whose content starts like `content`, in store order.
    pub fn candidates(&self, content: &str) -> &[NodeId] {
        self.by_fingerprint
            .get(fingerprint(content))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The resolved path of an indexed file.
    pub fn path_of(&self, id: NodeId) -> Option<&str> {
        self.paths.get(&id).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{snapshot::PLACEHOLDER_CONTENT, tree::test_util::TreeBuilder};

    #[test]
    fn fingerprint_counts_characters() {
        let short = "hello";
        assert_eq!(fingerprint(short), short);

        let long: String = "é".repeat(FINGERPRINT_LEN + 5);
        let print = fingerprint(&long);
        assert_eq!(print.chars().count(), FINGERPRINT_LEN);
        assert!(long.starts_with(print));
    }

    #[test]
    fn shared_prefixes_share_a_fingerprint() {
        let base = "x".repeat(FINGERPRINT_LEN);
        let mut builder = TreeBuilder::new();
        let first = builder.file(None, "a.txt", &format!("{}AAA", base));
        let second = builder.file(None, "b.txt", &format!("{}BBB", base));
        let index = FingerprintIndex::build(&builder.build());

        assert_eq!(index.candidates(&base), &[first, second]);
    }

    #[test]
    fn empty_files_have_no_fingerprint() {
        let mut builder = TreeBuilder::new();
        let empty = builder.file(None, "empty.js", "");
        let index = FingerprintIndex::build(&builder.build());

        assert_eq!(index.by_path("/empty.js"), Some(empty));
        assert!(index.candidates("").is_empty());
    }

    #[test]
    fn duplicate_paths_keep_the_first_node() {
        let mut builder = TreeBuilder::new();
        let first = builder.file(None, "dup.js", "one");
        let second = builder.file(None, "dup.js", "two");
        let index = FingerprintIndex::build(&builder.build());

        assert_eq!(index.by_path("/dup.js"), Some(first));
        assert_eq!(index.candidates("two"), &[second]);
        assert_eq!(index.path_of(second), Some("/dup.js"));
    }

    #[test]
    fn placeholders_are_not_indexed() {
        let mut builder = TreeBuilder::new();
        let folder = builder.folder(None, "empty");
        let placeholder = builder.file(Some(folder), ".tempdata", PLACEHOLDER_CONTENT);
        let index = FingerprintIndex::build(&builder.build());

        assert_eq!(index.by_path("/empty/.tempdata"), None);
        assert!(index.candidates(PLACEHOLDER_CONTENT).is_empty());
        assert_eq!(index.path_of(placeholder), None);
    }
}
