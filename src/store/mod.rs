//! Document storage for node and project records.
//!
//! `Documents` owns the in-memory collections and hands every mutation to a
//! [`DocumentBackend`] for persistence. When the backend fails to commit,
//! the mutation is undone so memory and storage never diverge.

mod in_memory;
mod json_file;

use std::{
    io,
    sync::{Mutex, MutexGuard},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    node::{Node, NodeId, ProjectId},
    project::Project,
};

pub use self::in_memory::InMemoryDocuments;
pub use self::json_file::JsonDocuments;

/// Errors surfaced by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("user '{user}' is not allowed to access project {project}")]
    Unauthorized { user: String, project: ProjectId },

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("storage failure while trying to {context}")]
    Failure {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound { what: what.into() }
    }

    pub fn failure(context: impl Into<String>, source: io::Error) -> Self {
        StoreError::Failure {
            context: context.into(),
            source,
        }
    }

    /// Maps an error from the blob store. Missing blobs become `NotFound`,
    /// everything else is a storage failure.
    pub fn from_blob(context: impl Into<String>, source: io::Error) -> Self {
        let context = context.into();
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound { what: context }
        } else {
            StoreError::Failure { context, source }
        }
    }

    /// A stable, machine-readable code for the error's category.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Unauthorized { .. } => "UNAUTHORIZED",
            StoreError::Invalid(_) => "INVALID",
            StoreError::Failure { .. } => "STORE_FAILURE",
        }
    }

    /// Only storage failures may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Failure { .. })
    }
}

/// Everything the document store keeps, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub projects: IndexMap<ProjectId, Project>,

    #[serde(default)]
    pub nodes: IndexMap<NodeId, Node>,
}

/// Persistence for [`Documents`].
pub trait DocumentBackend: Send + 'static {
    /// Reads whatever was committed last.
    fn load(&mut self) -> io::Result<Collections>;

    /// Durably records the full state after a mutation.
    fn commit(&mut self, collections: &Collections) -> io::Result<()>;
}

struct DocumentsInner {
    backend: Box<dyn DocumentBackend>,
    data: Collections,
}

impl DocumentsInner {
    fn commit(&mut self, context: impl FnOnce() -> String) -> Result<(), StoreError> {
        self.backend
            .commit(&self.data)
            .map_err(|err| StoreError::failure(context(), err))
    }

    fn insert_node(&mut self, node: Node) -> Result<(), StoreError> {
        if self.data.nodes.contains_key(&node.id) {
            return Err(StoreError::Conflict(format!("node {} already exists", node.id)));
        }

        let id = node.id;
        self.data.nodes.insert(id, node);

        if let Err(err) = self.commit(|| format!("insert node {}", id)) {
            self.data.nodes.shift_remove(&id);
            return Err(err);
        }

        Ok(())
    }

    fn replace_node(&mut self, node: Node) -> Result<Node, StoreError> {
        let id = node.id;
        let slot = self
            .data
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("node {}", id)))?;
        let previous = std::mem::replace(slot, node);

        if let Err(err) = self.commit(|| format!("update node {}", id)) {
            if let Some(slot) = self.data.nodes.get_mut(&id) {
                *slot = previous;
            }
            return Err(err);
        }

        Ok(previous)
    }

    fn remove_node(&mut self, id: NodeId) -> Result<Node, StoreError> {
        let (index, _, removed) = self
            .data
            .nodes
            .shift_remove_full(&id)
            .ok_or_else(|| StoreError::not_found(format!("node {}", id)))?;

        if let Err(err) = self.commit(|| format!("delete node {}", id)) {
            self.data.nodes.shift_insert(index, id, removed);
            return Err(err);
        }

        Ok(removed)
    }

    fn insert_project(&mut self, project: Project) -> Result<(), StoreError> {
        if self.data.projects.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }

        let id = project.id;
        self.data.projects.insert(id, project);

        if let Err(err) = self.commit(|| format!("insert project {}", id)) {
            self.data.projects.shift_remove(&id);
            return Err(err);
        }

        Ok(())
    }

    fn remove_project(&mut self, id: ProjectId) -> Result<Project, StoreError> {
        let (index, _, removed) = self
            .data
            .projects
            .shift_remove_full(&id)
            .ok_or_else(|| StoreError::not_found(format!("project {}", id)))?;

        if let Err(err) = self.commit(|| format!("delete project {}", id)) {
            self.data.projects.shift_insert(index, id, removed);
            return Err(err);
        }

        Ok(removed)
    }
}

/// Record storage for nodes and projects with a configurable backend.
///
/// All operations take a lock on the internal state. Use `lock()` to run a
/// batch of reads against one consistent view.
pub struct Documents {
    inner: Mutex<DocumentsInner>,
}

impl Documents {
    /// Creates a new `Documents`, loading the current state from `backend`.
    pub fn new<B: DocumentBackend>(mut backend: B) -> Result<Self, StoreError> {
        let data = backend
            .load()
            .map_err(|err| StoreError::failure("load documents", err))?;

        log::debug!(
            "Loaded {} project(s) and {} node(s)",
            data.projects.len(),
            data.nodes.len()
        );

        Ok(Self {
            inner: Mutex::new(DocumentsInner {
                backend: Box::new(backend),
                data,
            }),
        })
    }

    pub fn new_in_memory() -> Self {
        Self {
            inner: Mutex::new(DocumentsInner {
                backend: Box::new(InMemoryDocuments::new()),
                data: Collections::default(),
            }),
        }
    }

    pub fn lock(&self) -> DocumentsLock<'_> {
        DocumentsLock {
            inner: self.inner.lock().unwrap(),
        }
    }

    pub fn insert_node(&self, node: Node) -> Result<(), StoreError> {
        self.lock().inner.insert_node(node)
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.lock().node(id).cloned()
    }

    /// Every node of a project, in the order they were stored.
    pub fn nodes_in_project(&self, project_id: ProjectId) -> Vec<Node> {
        self.lock().nodes_in_project(project_id).cloned().collect()
    }

    /// Replaces a stored node, returning the previous version.
    pub fn replace_node(&self, node: Node) -> Result<Node, StoreError> {
        self.lock().inner.replace_node(node)
    }

    pub fn remove_node(&self, id: NodeId) -> Result<Node, StoreError> {
        self.lock().inner.remove_node(id)
    }

    pub fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        self.lock().inner.insert_project(project)
    }

    pub fn project(&self, id: ProjectId) -> Option<Project> {
        self.lock().project(id).cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().inner.data.projects.values().cloned().collect()
    }

    pub fn remove_project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.lock().inner.remove_project(id)
    }
}

/// A locked handle to [`Documents`], created by `Documents::lock`.
pub struct DocumentsLock<'a> {
    inner: MutexGuard<'a, DocumentsInner>,
}

impl DocumentsLock<'_> {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.inner.data.nodes.get(&id)
    }

    pub fn nodes_in_project(&self, project_id: ProjectId) -> impl Iterator<Item = &Node> {
        self.inner
            .data
            .nodes
            .values()
            .filter(move |node| node.project_id == project_id)
    }

    /// Children of `parent` in a project. `None` means the project root.
    pub fn children_of(
        &self,
        project_id: ProjectId,
        parent: Option<NodeId>,
    ) -> impl Iterator<Item = &Node> {
        self.nodes_in_project(project_id)
            .filter(move |node| node.parent_id == parent)
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.inner.data.projects.get(&id)
    }

    pub fn insert_node(&mut self, node: Node) -> Result<(), StoreError> {
        self.inner.insert_node(node)
    }

    pub fn replace_node(&mut self, node: Node) -> Result<Node, StoreError> {
        self.inner.replace_node(node)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, StoreError> {
        self.inner.remove_node(id)
    }
}

#[cfg(test)]
pub(crate) mod test_backend {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    /// Backend whose commits start failing once a budget runs out.
    #[derive(Clone)]
    pub struct FlakyDocuments {
        remaining: Arc<AtomicUsize>,
    }

    impl FlakyDocuments {
        pub fn new(successful_commits: usize) -> Self {
            Self {
                remaining: Arc::new(AtomicUsize::new(successful_commits)),
            }
        }

        pub fn set_remaining(&self, successful_commits: usize) {
            self.remaining.store(successful_commits, Ordering::SeqCst);
        }
    }

    impl DocumentBackend for FlakyDocuments {
        fn load(&mut self) -> io::Result<Collections> {
            Ok(Collections::default())
        }

        fn commit(&mut self, _collections: &Collections) -> io::Result<()> {
            let result = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            match result {
                Ok(_) => Ok(()),
                Err(_) => Err(io::Error::other("simulated outage")),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::test_backend::FlakyDocuments;
    use super::*;
    use crate::{language::Language, node::NodeKind};

    fn folder(project_id: ProjectId, name: &str) -> Node {
        Node {
            id: NodeId::new(),
            project_id,
            parent_id: None,
            name: name.to_owned(),
            kind: NodeKind::Folder,
            content_ref: None,
            size_in_bytes: 0,
            language: Language::default(),
        }
    }

    #[test]
    fn duplicate_insert_is_conflict() {
        let docs = Documents::new_in_memory();
        let node = folder(ProjectId::new(), "src");
        docs.insert_node(node.clone()).unwrap();

        let err = docs.insert_node(node).unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn failed_commit_rolls_back_insert() {
        let backend = FlakyDocuments::new(0);
        let docs = Documents::new(backend).unwrap();
        let node = folder(ProjectId::new(), "src");

        let err = docs.insert_node(node.clone()).unwrap_err();
        assert!(err.is_retryable());
        assert!(docs.node(node.id).is_none());
    }

    #[test]
    fn failed_commit_restores_removed_node_in_place() {
        let backend = FlakyDocuments::new(3);
        let docs = Documents::new(backend.clone()).unwrap();
        let project = ProjectId::new();
        let a = folder(project, "a");
        let b = folder(project, "b");
        let c = folder(project, "c");
        for node in [&a, &b, &c] {
            docs.insert_node(node.clone()).unwrap();
        }

        backend.set_remaining(0);
        docs.remove_node(b.id).unwrap_err();

        let names: Vec<String> = docs
            .nodes_in_project(project)
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn failed_commit_restores_replaced_node() {
        let backend = FlakyDocuments::new(1);
        let docs = Documents::new(backend).unwrap();
        let node = folder(ProjectId::new(), "before");
        docs.insert_node(node.clone()).unwrap();

        let mut renamed = node.clone();
        renamed.name = "after".to_owned();
        docs.replace_node(renamed).unwrap_err();

        assert_eq!(docs.node(node.id).unwrap().name, "before");
    }

    #[test]
    fn missing_node_is_not_found() {
        let docs = Documents::new_in_memory();
        let err = docs.remove_node(NodeId::new()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(!err.is_retryable());
    }
}
