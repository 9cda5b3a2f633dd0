use std::path::{Path, PathBuf};

use tempfile::{tempdir, TempDir};

use libcanopy::{
    workspace::Workspace, DesiredSnapshot, EditSession, NewProject, SaveOutcome, SaveTrigger,
    WorkspaceConfig,
};

/// A workspace in a temporary directory with a bound, empty project.
pub struct TestWorkspace {
    // Held so the directory outlives the workspace.
    _dir: TempDir,
    root: PathBuf,
    pub workspace: Workspace,
}

impl TestWorkspace {
    pub fn new(name: &str) -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let dir = tempdir().unwrap();
        let root = dir.path().join("workspace");
        fs_err::create_dir_all(&root).unwrap();

        let config = WorkspaceConfig::new(name);
        let mut workspace = Workspace::with_config(&root, config).unwrap();
        let project = workspace
            .projects()
            .create(
                "local",
                NewProject {
                    name: name.to_owned(),
                    ..Default::default()
                },
            )
            .unwrap();
        workspace.bind_project(project.id).unwrap();

        Self {
            _dir: dir,
            root,
            workspace,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reopens the workspace from disk, dropping every in-memory cache.
    pub fn reopen(&mut self) {
        self.workspace = Workspace::open(&self.root).unwrap();
    }

    pub fn session(&self) -> EditSession {
        self.workspace.session().unwrap()
    }

    pub fn save(&self, snapshot: &DesiredSnapshot) -> libcanopy::ReconcileReport {
        match self.session().save(snapshot, SaveTrigger::Manual).unwrap() {
            SaveOutcome::Saved(report) => report,
            SaveOutcome::Busy => panic!("fresh sessions are never busy"),
        }
    }

    /// `(path, content)` pairs of the stored project, in projection order.
    pub fn stored(&self) -> Vec<(String, String)> {
        self.session()
            .projection()
            .unwrap()
            .files
            .into_iter()
            .collect()
    }
}

pub fn snapshot(entries: &[(&str, &str)]) -> DesiredSnapshot {
    entries.iter().copied().collect()
}

pub fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect()
}
