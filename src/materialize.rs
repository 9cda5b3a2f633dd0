use std::collections::HashMap;

use crate::{
    files::{FileService, NewNode},
    node::{NodeId, ProjectId},
    path::join_path,
    store::StoreError,
    tree::PersistedTree,
};

/// A folder created while materializing a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFolder {
    pub id: NodeId,
    pub path: String,
}

/// Makes sure folder records exist for directory paths, creating the missing
/// ones through the [`FileService`].
///
/// Lookups cover both the folders that were stored when the materializer was
/// built and the folders it created since, so a directory shared by several
/// new files is only created once.
pub struct FolderMaterializer<'a> {
    files: &'a FileService,
    project_id: ProjectId,
    folders: HashMap<(Option<NodeId>, String), NodeId>,
    created: Vec<CreatedFolder>,
}

impl<'a> FolderMaterializer<'a> {
    pub fn new(files: &'a FileService, tree: &PersistedTree) -> Self {
        let mut folders = HashMap::new();
        for folder in tree.folders() {
            folders
                .entry((folder.parent_id, folder.name.clone()))
                .or_insert(folder.id);
        }

        Self {
            files,
            project_id: tree.project_id(),
            folders,
            created: Vec::new(),
        }
    }

    /// Walks `segments` from the project root, creating each missing folder
    /// in order, and returns the id of the deepest one. An empty list means
    /// the root, which has no id.
    pub fn ensure_folder_path(&mut self, segments: &[&str]) -> Result<Option<NodeId>, StoreError> {
        let mut parent = None;
        let mut path = String::from("/");

        for segment in segments.iter().map(|segment| segment.trim()) {
            if segment.is_empty() {
                continue;
            }
            path = join_path(&path, segment);

            let key = (parent, segment.to_owned());
            let id = match self.folders.get(&key) {
                Some(&id) => id,
                None => {
                    let folder = self
                        .files
                        .create(NewNode::folder(self.project_id, parent, segment))?;

                    log::debug!("Created folder {}", path);
                    self.folders.insert(key, folder.id);
                    self.created.push(CreatedFolder {
                        id: folder.id,
                        path: path.clone(),
                    });
                    folder.id
                }
            };

            parent = Some(id);
        }

        Ok(parent)
    }

    /// Hands out the folders created since the last call.
    pub fn take_created(&mut self) -> Vec<CreatedFolder> {
        std::mem::take(&mut self.created)
    }
}
