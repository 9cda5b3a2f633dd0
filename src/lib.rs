//! Canopy keeps a stored project tree in step with the files an editor
//! holds, preserving node identity across renames and moves.

pub mod cli;
pub mod config;
pub mod files;
pub mod fingerprint;
mod json;
pub mod language;
pub mod logging;
pub mod materialize;
pub mod node;
pub mod path;
pub mod project;
pub mod projection;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod template;
pub mod tree;
pub mod workspace;

pub use blobfs;

pub use config::{ConfigError, WorkspaceConfig};
pub use files::{FileService, NewNode, NodeUpdate};
pub use language::Language;
pub use node::{Node, NodeId, NodeKind, ProjectId};
pub use project::{NewProject, Project, ProjectService, Template};
pub use projection::{Projection, TreeItem};
pub use reconcile::{reconcile, CancelToken, Operation, ReconcileError, ReconcileReport, Reconciler};
pub use session::{AutoSaveEvent, AutoSaver, EditSession, SaveOutcome, SaveTrigger, SessionError};
pub use snapshot::DesiredSnapshot;
pub use store::{Documents, StoreError};
pub use tree::PersistedTree;
pub use workspace::Workspace;
