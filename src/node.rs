//! Records for the files and folders that make up a stored project.

use std::fmt;

use blobfs::BlobKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::language::Language;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                $name(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Stable identity of a stored file or folder. Survives renames and moves.
    NodeId
}

uuid_id! {
    /// Identity of a project, the unit that owns a tree of nodes.
    ProjectId
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub fn is_folder(self) -> bool {
        self == NodeKind::Folder
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Folder => f.write_str("folder"),
        }
    }
}

/// A persisted file or folder.
///
/// A node's path is never stored. It is derived by walking `parent_id` links
/// up to the project root, see [`PathResolver`](crate::path::PathResolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub project_id: ProjectId,

    /// `None` for nodes at the project root.
    #[serde(default)]
    pub parent_id: Option<NodeId>,

    pub name: String,
    pub kind: NodeKind,

    /// Where the content of a file lives in the blob store. Always `None` for
    /// folders, and for files that were never given content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<BlobKey>,

    #[serde(default)]
    pub size_in_bytes: u64,

    #[serde(default)]
    pub language: Language,
}

impl Node {
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    pub fn is_file(&self) -> bool {
        !self.kind.is_folder()
    }
}

/// Checks a file or folder name before it is written to the store.
///
/// Returns the trimmed name, or a message describing why it was rejected.
pub fn validate_name(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("name is empty");
    }

    if trimmed.contains('/') {
        return Err("name contains a path separator");
    }

    if trimmed == "." || trimmed == ".." {
        return Err("name is a relative path component");
    }

    Ok(trimmed.to_owned())
}
