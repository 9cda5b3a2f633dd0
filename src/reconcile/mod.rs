//! Merges a desired snapshot into the stored tree of a project.
//!
//! Reconciliation runs in three passes over one snapshot and one loaded
//! [`PersistedTree`]:
//!
//! 1. **Claim.** Each real file entry claims at most one stored file, first
//!    by exact path for every entry, then by content fingerprint for the
//!    entries still unmatched. A stored file is claimed at most once.
//! 2. **Delete.** Every stored file nobody claimed is deleted, along with
//!    any stored placeholder. Deleting before anything else is written means
//!    incoming renames can't collide with files that are on their way out.
//! 3. **Apply.** Entries are visited in snapshot order. Claimed files are
//!    renamed, moved and rewritten as needed, unclaimed entries are created,
//!    and missing folders are materialized along the way.
//!
//! Matching only looks at the state loaded for the call, so running the same
//! snapshot again after a partial failure converges on the same result.

mod operation;


use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use thiserror::Error;

use crate::{
    files::{FileService, NewNode, NodeUpdate},
    fingerprint::FingerprintIndex,
    materialize::FolderMaterializer,
    node::NodeId,
    path::{join_path, split_path},
    snapshot::{classify, is_placeholder_path, DesiredSnapshot, EntryKind},
    store::StoreError,
    tree::PersistedTree,
};

pub use self::operation::{Operation, ReconcileReport};

/// Shared flag that stops a reconciliation between entries.
///
/// A store call that was already issued always runs to completion. Raising
/// the flag only keeps new entries from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("could not reconcile {path}")]
    Store {
        /// The snapshot entry, or stored file, being processed.
        path: String,
        /// Operations that were applied before the failure.
        completed: Vec<Operation>,
        #[source]
        source: StoreError,
    },

    #[error("reconciliation was cancelled after {} operation(s)", completed.len())]
    Cancelled { completed: Vec<Operation> },
}

impl ReconcileError {
    pub fn completed(&self) -> &[Operation] {
        match self {
            ReconcileError::Store { completed, .. } | ReconcileError::Cancelled { completed } => {
                completed
            }
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReconcileError::Store { source, .. } => Some(source),
            ReconcileError::Cancelled { .. } => None,
        }
    }
}

/// A real file entry of the snapshot and the stored file it claimed.
struct Entry<'s> {
    path: &'s str,
    content: &'s str,
    claim: Option<NodeId>,
}

/// Applies desired snapshots to one project through a [`FileService`].
pub struct Reconciler<'a> {
    files: &'a FileService,
    cancel: Option<CancelToken>,
}

impl<'a> Reconciler<'a> {
    pub fn new(files: &'a FileService) -> Self {
        Self {
            files,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn reconcile(
        &self,
        desired: &DesiredSnapshot,
        persisted: &PersistedTree,
    ) -> Result<ReconcileReport, ReconcileError> {
        let index = FingerprintIndex::build(persisted);
        let mut report = ReconcileReport::default();

        let mut entries = Vec::new();
        for (path, content) in desired.iter() {
            match classify(path, content) {
                EntryKind::File(content) => entries.push(Entry {
                    path,
                    content,
                    claim: None,
                }),
                EntryKind::Missing => {
                    log::warn!("Skipping {}: it has no content", path);
                    report.skipped.push(path.to_owned());
                }
                EntryKind::FolderMarker | EntryKind::Placeholder => {}
            }
        }

        let claimed = claim_entries(&mut entries, &index);

        let mut run = Run {
            files: self.files,
            cancel: self.cancel.as_ref(),
            operations: Vec::new(),
        };

        run.delete_unclaimed(persisted, &index, &claimed)?;
        run.apply_entries(&entries, persisted, &index)?;

        report.operations = run.operations;

        log::info!(
            "Reconciled {} file(s) in project {}: {} operation(s), {} skipped",
            entries.len(),
            persisted.project_id(),
            report.operations.len(),
            report.skipped.len()
        );

        Ok(report)
    }
}

/// Reconciles `desired` against `persisted` without a cancel token.
pub fn reconcile(
    desired: &DesiredSnapshot,
    persisted: &PersistedTree,
    files: &FileService,
) -> Result<ReconcileReport, ReconcileError> {
    Reconciler::new(files).reconcile(desired, persisted)
}

/// Assigns stored files to entries. Path matches go first for every entry so
/// a fingerprint match can never take a file whose path is still wanted.
fn claim_entries(entries: &mut [Entry<'_>], index: &FingerprintIndex) -> HashSet<NodeId> {
    let mut claimed = HashSet::new();

    for entry in entries.iter_mut() {
        if let Some(id) = index.by_path(entry.path) {
            log::trace!("{} claims {} by path", entry.path, id);
            entry.claim = Some(id);
            claimed.insert(id);
        }
    }

    for entry in entries.iter_mut().filter(|entry| entry.claim.is_none()) {
        let candidate = index
            .candidates(entry.content)
            .iter()
            .copied()
            .find(|id| !claimed.contains(id));

        if let Some(id) = candidate {
            log::trace!(
                "{} claims {} ({}) by fingerprint",
                entry.path,
                id,
                index.path_of(id).unwrap_or("?")
            );
            entry.claim = Some(id);
            claimed.insert(id);
        }
    }

    claimed
}

/// Mutable state of one reconciliation call.
struct Run<'a> {
    files: &'a FileService,
    cancel: Option<&'a CancelToken>,
    operations: Vec<Operation>,
}

impl Run<'_> {
    fn check_cancelled(&mut self) -> Result<(), ReconcileError> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            log::info!(
                "Reconciliation cancelled after {} operation(s)",
                self.operations.len()
            );
            return Err(ReconcileError::Cancelled {
                completed: std::mem::take(&mut self.operations),
            });
        }
        Ok(())
    }

    fn fail(&mut self, path: &str, source: StoreError) -> ReconcileError {
        log::warn!("Reconciliation stopped at {}: {}", path, source);
        ReconcileError::Store {
            path: path.to_owned(),
            completed: std::mem::take(&mut self.operations),
            source,
        }
    }

    fn record(&mut self, operation: Operation) {
        log::debug!("{}", operation);
        self.operations.push(operation);
    }

    fn delete_unclaimed(
        &mut self,
        persisted: &PersistedTree,
        index: &FingerprintIndex,
        claimed: &HashSet<NodeId>,
    ) -> Result<(), ReconcileError> {
        let resolver = persisted.path_resolver();

        for node in persisted.files() {
            let placeholder = is_placeholder_path(&node.name);
            if claimed.contains(&node.id) && !placeholder {
                continue;
            }

            self.check_cancelled()?;

            let path = index
                .path_of(node.id)
                .map(str::to_owned)
                .unwrap_or_else(|| resolver.resolve(node));

            if let Err(err) = self.files.delete(node.id) {
                return Err(self.fail(&path, err));
            }

            self.record(Operation::Delete { id: node.id, path });
        }

        Ok(())
    }

    fn apply_entries(
        &mut self,
        entries: &[Entry<'_>],
        persisted: &PersistedTree,
        index: &FingerprintIndex,
    ) -> Result<(), ReconcileError> {
        let mut materializer = FolderMaterializer::new(self.files, persisted);

        for entry in entries {
            self.check_cancelled()?;

            let result = self.apply_entry(entry, persisted, index, &mut materializer);

            for folder in materializer.take_created() {
                self.record(Operation::CreateFolder {
                    id: folder.id,
                    path: folder.path,
                });
            }

            if let Err(err) = result {
                return Err(self.fail(entry.path, err));
            }
        }

        Ok(())
    }

    fn apply_entry(
        &mut self,
        entry: &Entry<'_>,
        persisted: &PersistedTree,
        index: &FingerprintIndex,
        materializer: &mut FolderMaterializer<'_>,
    ) -> Result<(), StoreError> {
        let Some((dirs, name)) = split_path(entry.path) else {
            log::warn!("Skipping snapshot entry without a file name");
            return Ok(());
        };

        let Some(id) = entry.claim else {
            let parent = materializer.ensure_folder_path(&dirs)?;
            for folder in materializer.take_created() {
                self.record(Operation::CreateFolder {
                    id: folder.id,
                    path: folder.path,
                });
            }

            let node = self.files.create(NewNode::file(
                persisted.project_id(),
                parent,
                name,
                entry.content,
            ))?;

            self.record(Operation::CreateFile {
                id: node.id,
                path: entry.path.to_owned(),
                size: node.size_in_bytes,
            });
            return Ok(());
        };

        let Some(node) = persisted.get(id) else {
            return Err(StoreError::not_found(format!("node {}", id)));
        };

        let current_path = index
            .path_of(id)
            .map(str::to_owned)
            .unwrap_or_else(|| persisted.path_resolver().resolve(node));

        let mut update = NodeUpdate::default();
        let mut pending = Vec::new();

        if current_path != entry.path {
            let parent = materializer.ensure_folder_path(&dirs)?;
            for folder in materializer.take_created() {
                self.record(Operation::CreateFolder {
                    id: folder.id,
                    path: folder.path,
                });
            }

            let mut intermediate = current_path.clone();

            if node.name != name {
                let old_dir = split_path(&current_path)
                    .map(|(old_dirs, _)| format!("/{}", old_dirs.join("/")))
                    .unwrap_or_else(|| "/".to_owned());
                intermediate = join_path(&old_dir, name);

                update.name = Some(name.to_owned());
                pending.push(Operation::Rename {
                    id,
                    from: current_path.clone(),
                    to: intermediate.clone(),
                });
            }

            if node.parent_id != parent {
                update.parent_id = Some(parent);
                pending.push(Operation::Move {
                    id,
                    from: intermediate,
                    to: entry.path.to_owned(),
                });
            }
        }

        let stored = persisted.content(id);
        if entry.content != stored {
            if entry.content.is_empty() && !stored.is_empty() {
                log::debug!(
                    "Not overwriting {} with empty content ({} bytes stored)",
                    entry.path,
                    stored.len()
                );
            } else {
                update.content = Some(entry.content.to_owned());
                pending.push(Operation::WriteContent {
                    id,
                    path: entry.path.to_owned(),
                    size: entry.content.len() as u64,
                });
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        self.files.update(id, update)?;
        for operation in pending {
            self.record(operation);
        }

        Ok(())
    }
}
