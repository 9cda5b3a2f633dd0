use std::fmt;

use crate::node::NodeId;

/// One change applied to the stores while reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateFolder { id: NodeId, path: String },
    CreateFile { id: NodeId, path: String, size: u64 },
    Rename { id: NodeId, from: String, to: String },
    Move { id: NodeId, from: String, to: String },
    WriteContent { id: NodeId, path: String, size: u64 },
    Delete { id: NodeId, path: String },
}

impl Operation {
    pub fn id(&self) -> NodeId {
        match self {
            Operation::CreateFolder { id, .. }
            | Operation::CreateFile { id, .. }
            | Operation::Rename { id, .. }
            | Operation::Move { id, .. }
            | Operation::WriteContent { id, .. }
            | Operation::Delete { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateFolder { .. } => "create-folder",
            Operation::CreateFile { .. } => "create-file",
            Operation::Rename { .. } => "rename",
            Operation::Move { .. } => "move",
            Operation::WriteContent { .. } => "write",
            Operation::Delete { .. } => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateFolder { path, .. } | Operation::Delete { path, .. } => {
                write!(f, "{} {}", self.kind(), path)
            }
            Operation::CreateFile { path, size, .. }
            | Operation::WriteContent { path, size, .. } => {
                write!(f, "{} {} ({} bytes)", self.kind(), path, size)
            }
            Operation::Rename { from, to, .. } | Operation::Move { from, to, .. } => {
                write!(f, "{} {} -> {}", self.kind(), from, to)
            }
        }
    }
}

/// Everything a successful reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub operations: Vec<Operation>,

    /// Snapshot paths that had no content and were left alone.
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, operation) in self.operations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", operation)?;
        }
        Ok(())
    }
}
