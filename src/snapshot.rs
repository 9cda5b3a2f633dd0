//! The desired state of a project, as reported by the editing surface.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::normalize_path;

/// Content the editing surface uses to mark a directory that has no files.
pub const FOLDER_MARKER: &str = "//#folder#//";

/// File name of the hidden placeholder that keeps empty folders visible.
pub const PLACEHOLDER_NAME: &str = ".tempdata";

/// Content written into hidden placeholders.
pub const PLACEHOLDER_CONTENT: &str = "# This is a temporary placeholder file\n\
# It exists only to make empty folders visible in the editor\n\
# This file will NOT be saved to your project\n\
# You can safely ignore or delete this file after adding content to the folder\n";

/// Whether a path names a hidden placeholder. Matches on the raw path text,
/// so `/a/b.tempdata` counts too.
pub fn is_placeholder_path(path: &str) -> bool {
    path.ends_with(PLACEHOLDER_NAME)
}

pub fn is_folder_marker(content: &str) -> bool {
    content.trim() == FOLDER_MARKER
}

/// What a single snapshot entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind<'a> {
    /// A real file with the given content.
    File(&'a str),
    FolderMarker,
    Placeholder,
    /// The entry has no content at all and can't be reconciled.
    Missing,
}

pub fn classify<'a>(path: &str, content: Option<&'a str>) -> EntryKind<'a> {
    if is_placeholder_path(path) {
        return EntryKind::Placeholder;
    }

    match content {
        None => EntryKind::Missing,
        Some(content) if is_folder_marker(content) => EntryKind::FolderMarker,
        Some(content) => EntryKind::File(content),
    }
}

/// A path-keyed map of everything the editing surface currently holds.
///
/// Paths are normalized on insert and keep their insertion order, which is
/// the order entries are reconciled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "IndexMap<String, Option<String>>",
    into = "IndexMap<String, Option<String>>"
)]
pub struct DesiredSnapshot {
    entries: IndexMap<String, Option<String>>,
}

impl DesiredSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file entry. Replacing keeps the original position.
    pub fn insert(&mut self, path: &str, content: impl Into<String>) {
        self.entries
            .insert(normalize_path(path), Some(content.into()));
    }

    /// Adds an entry whose content was never provided.
    pub fn insert_missing(&mut self, path: &str) {
        self.entries.insert(normalize_path(path), None);
    }

    pub fn insert_folder_marker(&mut self, path: &str) {
        self.insert(path, FOLDER_MARKER);
    }

    pub fn with(mut self, path: &str, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn remove(&mut self, path: &str) -> Option<Option<String>> {
        self.entries.shift_remove(&normalize_path(path))
    }

    pub fn get(&self, path: &str) -> Option<Option<&str>> {
        self.entries
            .get(&normalize_path(path))
            .map(|content| content.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_deref()))
    }

    /// Entries that stand for real files, skipping markers, placeholders and
    /// entries without content.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter_map(|(path, content)| match classify(path, content) {
                EntryKind::File(content) => Some((path, content)),
                _ => None,
            })
    }
}

impl From<IndexMap<String, Option<String>>> for DesiredSnapshot {
    fn from(raw: IndexMap<String, Option<String>>) -> Self {
        let mut snapshot = DesiredSnapshot::new();
        for (path, content) in raw {
            snapshot.entries.insert(normalize_path(&path), content);
        }
        snapshot
    }
}

impl From<DesiredSnapshot> for IndexMap<String, Option<String>> {
    fn from(snapshot: DesiredSnapshot) -> Self {
        snapshot.entries
    }
}

impl<P: AsRef<str>, C: Into<String>> FromIterator<(P, C)> for DesiredSnapshot {
    fn from_iter<T: IntoIterator<Item = (P, C)>>(iter: T) -> Self {
        let mut snapshot = DesiredSnapshot::new();
        for (path, content) in iter {
            snapshot.insert(path.as_ref(), content);
        }
        snapshot
    }
}
