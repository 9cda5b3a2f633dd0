//! Moving project contents between a directory on disk and the stores.

use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{format_err, Context};
use blobfs::{Blobs, StdBlobs};
use globset::GlobSet;
use walkdir::WalkDir;

use crate::{
    config::WorkspaceConfig,
    files::FileService,
    node::ProjectId,
    project::{Project, ProjectService},
    projection::Projection,
    session::EditSession,
    snapshot::DesiredSnapshot,
    store::{Documents, JsonDocuments},
};

/// A directory on disk tied to one stored project through its
/// `canopy.json5`.
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    ignore: GlobSet,
    files: Arc<FileService>,
    projects: ProjectService,
}

impl Workspace {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = WorkspaceConfig::load(root)?;
        Self::with_config(root, config)
    }

    /// Opens the stores named by `config` without reading `canopy.json5`.
    /// Records go to `<storage>/documents.json`, blobs below
    /// `<storage>/blobs`.
    pub fn with_config(root: &Path, config: WorkspaceConfig) -> anyhow::Result<Self> {
        let storage = config.storage_path(root);
        let ignore = config.ignore_set()?;

        let documents = Documents::new(JsonDocuments::in_dir(&storage))
            .with_context(|| format!("Could not open the store in {}", storage.display()))?;
        let documents = Arc::new(documents);
        let blobs = Arc::new(Blobs::new(StdBlobs::new(storage.join("blobs"))));

        log::debug!("Opened workspace {} (store {})", root.display(), storage.display());

        Ok(Self {
            root: root.to_path_buf(),
            config,
            ignore,
            files: Arc::new(FileService::new(Arc::clone(&documents), blobs)),
            projects: ProjectService::new(documents),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn files(&self) -> &Arc<FileService> {
        &self.files
    }

    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    pub fn ignore(&self) -> &GlobSet {
        &self.ignore
    }

    /// Records the project this workspace edits and writes the config back.
    pub fn bind_project(&mut self, id: ProjectId) -> anyhow::Result<()> {
        self.config.project_id = Some(id);
        self.config.save(&self.root)?;
        Ok(())
    }

    /// The bound project, checked against the configured owner.
    pub fn project(&self) -> anyhow::Result<Project> {
        let id = self.config.project_id.ok_or_else(|| {
            format_err!(
                "{} has no project yet, run 'canopy init' first",
                self.root.display()
            )
        })?;

        Ok(self.projects.get_owned(id, &self.config.owner)?)
    }

    pub fn session(&self) -> anyhow::Result<EditSession> {
        let project = self.project()?;
        Ok(EditSession::new(Arc::clone(&self.files), project.id))
    }

    pub fn read_snapshot(&self) -> anyhow::Result<DesiredSnapshot> {
        read_snapshot(&self.root, &self.ignore)
    }

    /// Writes the stored project to `dir`, repairing a broken
    /// `package.json` on the way out.
    pub fn checkout(&self, dir: &Path, clean: bool) -> anyhow::Result<CheckoutStats> {
        let project = self.project()?;
        let tree = self.files.load_tree(project.id)?;

        let mut projection = crate::projection::project(&tree);
        projection.repair_manifest(&project.name);

        write_projection(dir, &projection, clean, &self.ignore)
    }
}

/// Counts of what [`write_projection`] changed on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutStats {
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// The workspace-relative, slash-separated form of `path`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();

    Some(segments?.join("/"))
}

fn snapshot_path_to_disk(root: &Path, path: &str) -> PathBuf {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

/// Reads every file under `root` into a desired snapshot.
///
/// Entries are sorted by file name within each directory. Directories with
/// nothing in them are recorded with a folder marker. Files that aren't
/// valid UTF-8 are skipped with a warning.
pub fn read_snapshot(root: &Path, ignore: &GlobSet) -> anyhow::Result<DesiredSnapshot> {
    let mut snapshot = DesiredSnapshot::new();
    let mut non_empty_dirs = HashSet::new();
    let mut dirs = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match relative_path(root, entry.path()) {
            Some(relative) => !ignore.is_match(&relative),
            None => false,
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Could not read {}", root.display()))?;
        let Some(relative) = relative_path(root, entry.path()) else {
            log::warn!("Skipping {}, its path is not valid UTF-8", entry.path().display());
            continue;
        };

        if let Some((parent, _)) = relative.rsplit_once('/') {
            non_empty_dirs.insert(parent.to_owned());
        }

        if entry.file_type().is_dir() {
            dirs.push(relative);
            continue;
        }

        if !entry.file_type().is_file() {
            log::debug!("Skipping {}, not a regular file", entry.path().display());
            continue;
        }

        let contents = fs_err::read(entry.path())?;
        match String::from_utf8(contents) {
            Ok(contents) => snapshot.insert(&relative, contents),
            Err(_) => log::warn!("Skipping {}, it is not valid UTF-8", entry.path().display()),
        }
    }

    for dir in dirs {
        if !non_empty_dirs.contains(&dir) {
            snapshot.insert_folder_marker(&dir);
        }
    }

    log::debug!(
        "Read {} entries from {}",
        snapshot.len(),
        root.display()
    );
    Ok(snapshot)
}

/// Writes every file of a projection under `root`, leaving files whose
/// contents already match untouched.
///
/// With `clean`, files under `root` that aren't part of the projection are
/// removed first, along with directories left empty. Ignored paths are
/// never removed.
pub fn write_projection(
    root: &Path,
    projection: &Projection,
    clean: bool,
    ignore: &GlobSet,
) -> anyhow::Result<CheckoutStats> {
    let mut stats = CheckoutStats::default();
    fs_err::create_dir_all(root)?;

    if clean {
        stats.removed = remove_stale(root, projection, ignore)?;
    }

    for (path, content) in &projection.files {
        let disk_path = snapshot_path_to_disk(root, path);

        match fs_err::read(&disk_path) {
            Ok(existing) if existing == content.as_bytes() => {
                stats.unchanged += 1;
                continue;
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(parent) = disk_path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(&disk_path, content)?;
        log::trace!("Wrote {}", disk_path.display());
        stats.written += 1;
    }

    log::info!(
        "Checked out {} file(s) to {} ({} unchanged, {} removed)",
        stats.written,
        root.display(),
        stats.unchanged,
        stats.removed
    );
    Ok(stats)
}

fn remove_stale(root: &Path, projection: &Projection, ignore: &GlobSet) -> anyhow::Result<usize> {
    let wanted: HashSet<&str> = projection
        .files
        .keys()
        .map(|path| path.trim_start_matches('/'))
        .collect();
    let mut removed = 0;

    let mut dirs = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| match relative_path(root, entry.path()) {
            Some(relative) => !ignore.is_match(&relative),
            None => false,
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Could not read {}", root.display()))?;
        let Some(relative) = relative_path(root, entry.path()) else {
            continue;
        };

        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        } else if !wanted.contains(relative.as_str()) {
            fs_err::remove_file(entry.path())?;
            log::debug!("Removed stale file {}", relative);
            removed += 1;
        }
    }

    // Deepest directories come last in walk order.
    for dir in dirs.into_iter().rev() {
        if fs_err::read_dir(&dir)?.next().is_none() {
            fs_err::remove_dir(&dir)?;
        }
    }

    Ok(removed)
}
