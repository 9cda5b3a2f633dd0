//! File and folder records, with file content kept in the blob store.

use std::{collections::HashMap, sync::Arc};

use blobfs::{BlobKey, Blobs, IoResultExt};
use uuid::Uuid;

use crate::{
    language::Language,
    node::{validate_name, Node, NodeId, NodeKind, ProjectId},
    path::PathResolver,
    store::{Documents, DocumentsLock, StoreError},
    tree::PersistedTree,
};

/// Parameters for [`FileService::create`].
#[derive(Debug, Clone)]
pub struct NewNode {
    pub project_id: ProjectId,
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub kind: NodeKind,

    /// Initial content for files. Ignored for folders.
    pub content: Option<String>,

    /// Defaults to a guess from the file name.
    pub language: Option<Language>,
}

impl NewNode {
    pub fn folder(project_id: ProjectId, parent_id: Option<NodeId>, name: impl Into<String>) -> Self {
        Self {
            project_id,
            parent_id,
            name: name.into(),
            kind: NodeKind::Folder,
            content: None,
            language: None,
        }
    }

    pub fn file(
        project_id: ProjectId,
        parent_id: Option<NodeId>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            parent_id,
            name: name.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
            language: None,
        }
    }
}

/// A partial update for [`FileService::update`]. `None` fields are left
/// untouched. `parent_id: Some(None)` moves a node to the project root.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub parent_id: Option<Option<NodeId>>,
    pub content: Option<String>,
    pub language: Option<Language>,
}

impl NodeUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn move_to(parent_id: Option<NodeId>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Builds a fresh blob key for a file: `projects/{project}/files/{unique}-{name}`.
fn new_content_key(project_id: ProjectId, name: &str) -> Result<BlobKey, StoreError> {
    let unique = Uuid::new_v4().simple();
    let raw = format!("projects/{}/files/{}-{}", project_id, unique, name);
    BlobKey::new(raw).map_err(|err| StoreError::Invalid(err.to_string()))
}

fn ensure_unique_sibling(
    lock: &DocumentsLock<'_>,
    project_id: ProjectId,
    parent_id: Option<NodeId>,
    name: &str,
    except: Option<NodeId>,
) -> Result<(), StoreError> {
    let taken = lock
        .children_of(project_id, parent_id)
        .any(|sibling| sibling.name == name && Some(sibling.id) != except);

    if taken {
        return Err(StoreError::Conflict(format!(
            "an item named '{}' already exists in this folder",
            name
        )));
    }

    Ok(())
}

fn ensure_parent_folder(
    lock: &DocumentsLock<'_>,
    project_id: ProjectId,
    parent_id: NodeId,
) -> Result<(), StoreError> {
    let parent = lock
        .node(parent_id)
        .ok_or_else(|| StoreError::not_found(format!("parent folder {}", parent_id)))?;

    if !parent.is_folder() {
        return Err(StoreError::Invalid(format!(
            "parent '{}' is not a folder",
            parent.name
        )));
    }

    if parent.project_id != project_id {
        return Err(StoreError::Invalid(format!(
            "parent '{}' belongs to another project",
            parent.name
        )));
    }

    Ok(())
}

/// The file record store: creates, reads, updates and deletes nodes, keeping
/// file content in the blob store.
///
/// Every write validates sibling name uniqueness and that parents are
/// folders of the same project. Moves that would place a folder inside
/// itself are rejected with a conflict.
#[derive(Clone)]
pub struct FileService {
    documents: Arc<Documents>,
    blobs: Arc<Blobs>,
}

impl FileService {
    pub fn new(documents: Arc<Documents>, blobs: Arc<Blobs>) -> Self {
        Self { documents, blobs }
    }

    pub fn documents(&self) -> &Arc<Documents> {
        &self.documents
    }

    pub fn blobs(&self) -> &Arc<Blobs> {
        &self.blobs
    }

    pub fn create(&self, new: NewNode) -> Result<Node, StoreError> {
        let name = validate_name(&new.name).map_err(|reason| {
            StoreError::Invalid(format!("cannot create '{}': {}", new.name, reason))
        })?;

        let mut lock = self.documents.lock();

        if lock.project(new.project_id).is_none() {
            return Err(StoreError::not_found(format!("project {}", new.project_id)));
        }

        if let Some(parent_id) = new.parent_id {
            ensure_parent_folder(&lock, new.project_id, parent_id)?;
        }

        ensure_unique_sibling(&lock, new.project_id, new.parent_id, &name, None)?;

        let language = new
            .language
            .unwrap_or_else(|| Language::from_file_name(&name));

        let mut node = Node {
            id: NodeId::new(),
            project_id: new.project_id,
            parent_id: new.parent_id,
            name,
            kind: new.kind,
            content_ref: None,
            size_in_bytes: 0,
            language,
        };

        if let (NodeKind::File, Some(content)) = (new.kind, &new.content) {
            let key = new_content_key(node.project_id, &node.name)?;
            self.blobs
                .put(&key, content, language.content_type())
                .map_err(|err| StoreError::from_blob(format!("upload {}", key), err))?;

            node.content_ref = Some(key);
            node.size_in_bytes = content.len() as u64;
        }

        if let Err(err) = lock.insert_node(node.clone()) {
            if let Some(key) = &node.content_ref {
                if let Err(cleanup) = self.blobs.delete(key) {
                    log::warn!("Could not remove orphaned blob {}: {}", key, cleanup);
                }
            }
            return Err(err);
        }

        log::trace!("Created {} {} ({})", node.kind, node.name, node.id);
        Ok(node)
    }

    pub fn get(&self, id: NodeId) -> Result<Node, StoreError> {
        self.documents
            .node(id)
            .ok_or_else(|| StoreError::not_found(format!("node {}", id)))
    }

    /// Reads a file's content. Files that never had content read as empty.
    pub fn content(&self, node: &Node) -> Result<String, StoreError> {
        match &node.content_ref {
            Some(key) => self
                .blobs
                .get_to_string(key)
                .map(|content| content.as_str().to_owned())
                .map_err(|err| StoreError::from_blob(format!("content of {}", node.name), err)),
            None => Ok(String::new()),
        }
    }

    pub fn get_with_content(&self, id: NodeId) -> Result<(Node, String), StoreError> {
        let node = self.get(id)?;
        let content = self.content(&node)?;
        Ok((node, content))
    }

    pub fn list_by_project(&self, project_id: ProjectId) -> Vec<Node> {
        self.documents.nodes_in_project(project_id)
    }

    /// Loads every node of a project along with the content of its files.
    ///
    /// A file whose content can't be fetched is loaded as empty rather than
    /// failing the whole load.
    pub fn load_tree(&self, project_id: ProjectId) -> Result<PersistedTree, StoreError> {
        if self.documents.project(project_id).is_none() {
            return Err(StoreError::not_found(format!("project {}", project_id)));
        }

        let nodes = self.list_by_project(project_id);
        let mut contents = HashMap::new();

        for node in nodes.iter().filter(|node| node.is_file()) {
            match self.content(node) {
                Ok(content) => {
                    contents.insert(node.id, content);
                }
                Err(err) => {
                    log::warn!("Loading {} with empty content: {}", node.name, err);
                    contents.insert(node.id, String::new());
                }
            }
        }

        Ok(PersistedTree::new(project_id, nodes, contents))
    }

    pub fn update(&self, id: NodeId, update: NodeUpdate) -> Result<Node, StoreError> {
        let mut lock = self.documents.lock();

        let current = lock
            .node(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("node {}", id)))?;
        let mut node = current.clone();

        if let Some(name) = &update.name {
            node.name = validate_name(name).map_err(|reason| {
                StoreError::Invalid(format!("cannot rename to '{}': {}", name, reason))
            })?;
        }

        if let Some(parent_id) = update.parent_id {
            if let Some(parent_id) = parent_id {
                ensure_parent_folder(&lock, node.project_id, parent_id)?;

                let resolver = PathResolver::new(lock.nodes_in_project(node.project_id));
                if resolver.is_same_or_ancestor(node.id, parent_id) {
                    return Err(StoreError::Conflict(format!(
                        "cannot move '{}' into itself or one of its descendants",
                        node.name
                    )));
                }
            }
            node.parent_id = parent_id;
        }

        if node.name != current.name || node.parent_id != current.parent_id {
            ensure_unique_sibling(&lock, node.project_id, node.parent_id, &node.name, Some(id))?;
        }

        if let Some(language) = update.language {
            node.language = language;
        }

        if let Some(content) = &update.content {
            if node.is_folder() {
                return Err(StoreError::Invalid(format!(
                    "'{}' is a folder and has no content",
                    node.name
                )));
            }

            // New content always gets a new key. The record only points at it
            // once the commit succeeds, so the old blob stays valid until then.
            let key = new_content_key(node.project_id, &node.name)?;

            self.blobs
                .put(&key, content, node.language.content_type())
                .map_err(|err| StoreError::from_blob(format!("upload {}", key), err))?;

            node.content_ref = Some(key);
            node.size_in_bytes = content.len() as u64;
        }

        let uploaded = update.content.is_some();

        if let Err(err) = lock.replace_node(node.clone()) {
            if let (true, Some(key)) = (uploaded, &node.content_ref) {
                if let Err(cleanup) = self.blobs.delete(key) {
                    log::warn!("Could not remove orphaned blob {}: {}", key, cleanup);
                }
            }
            return Err(err);
        }

        if let (true, Some(old_key)) = (uploaded, &current.content_ref) {
            if let Err(err) = self.blobs.delete(old_key).with_not_found() {
                log::warn!("Could not remove replaced blob {}: {}", old_key, err);
            }
        }

        Ok(node)
    }

    /// Deletes a node. Deleting a folder deletes everything below it, each
    /// node after its descendants and each file's blob before its record.
    ///
    /// Returns the ids of every removed node.
    pub fn delete(&self, id: NodeId) -> Result<Vec<NodeId>, StoreError> {
        let mut lock = self.documents.lock();

        let root = lock
            .node(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("node {}", id)))?;

        let mut order = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut worklist = vec![root.id];

        while let Some(current) = worklist.pop() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            worklist.extend(
                lock.children_of(root.project_id, Some(current))
                    .map(|child| child.id),
            );
        }

        let mut removed = Vec::with_capacity(order.len());
        for node_id in order.into_iter().rev() {
            self.remove_one(&mut lock, node_id)?;
            removed.push(node_id);
        }

        Ok(removed)
    }

    fn remove_one(&self, lock: &mut DocumentsLock<'_>, id: NodeId) -> Result<(), StoreError> {
        let Some(node) = lock.node(id).cloned() else {
            return Ok(());
        };

        if let Some(key) = &node.content_ref {
            self.blobs
                .delete(key)
                .with_not_found()
                .map_err(|err| StoreError::from_blob(format!("delete {}", key), err))?;
        }

        lock.remove_node(id)?;
        log::trace!("Deleted {} {} ({})", node.kind, node.name, node.id);
        Ok(())
    }

    /// Deletes every node and blob that belongs to a project.
    pub fn delete_project_files(&self, project_id: ProjectId) -> Result<Vec<NodeId>, StoreError> {
        let mut lock = self.documents.lock();
        let ids: Vec<NodeId> = lock.nodes_in_project(project_id).map(|n| n.id).collect();

        for id in &ids {
            self.remove_one(&mut lock, *id)?;
        }

        let prefix = format!("projects/{}/", project_id);
        let leftovers = self
            .blobs
            .keys(&prefix)
            .map_err(|err| StoreError::from_blob("list project blobs", err))?;
        for key in leftovers {
            log::debug!("Removing unreferenced blob {}", key);
            self.blobs
                .delete(&key)
                .with_not_found()
                .map_err(|err| StoreError::from_blob(format!("delete {}", key), err))?;
        }

        Ok(ids)
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::{
        project::{NewProject, ProjectService},
        store::{DocumentBackend, InMemoryDocuments},
    };

    /// An in-memory file service with one project already created.
    pub fn service_with_project() -> (FileService, ProjectId) {
        service_with_backend(InMemoryDocuments::new())
    }

    /// Like `service_with_project`, with records kept by `backend`.
    pub fn service_with_backend<B: DocumentBackend>(backend: B) -> (FileService, ProjectId) {
        let documents = Arc::new(Documents::new(backend).unwrap());
        let blobs = Arc::new(Blobs::new_in_memory());
        let project = ProjectService::new(Arc::clone(&documents))
            .create(
                "tester",
                NewProject {
                    name: "Test Project".to_owned(),
                    ..Default::default()
                },
            )
            .unwrap();

        (FileService::new(documents, blobs), project.id)
    }
}
