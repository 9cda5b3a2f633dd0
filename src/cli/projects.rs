use std::path::PathBuf;

use clap::Parser;

use crate::workspace::Workspace;

use super::resolve_workspace_dir;

/// Lists the projects the workspace's owner has in its store. The project
/// the workspace is bound to is marked with `*`.
#[derive(Debug, Parser)]
pub struct ProjectsCommand {
    /// Path to the workspace. Defaults to the current directory.
    #[clap(default_value = ".")]
    pub path: PathBuf,
}

impl ProjectsCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let base_path = resolve_workspace_dir(&self.path);
        let workspace = Workspace::open(&base_path)?;
        let owner = &workspace.config().owner;

        let projects = workspace.projects().list_for_owner(owner);
        if projects.is_empty() {
            println!("No projects owned by '{}'", owner);
            return Ok(());
        }

        for project in projects {
            let marker = if workspace.config().project_id == Some(project.id) {
                "*"
            } else {
                " "
            };
            println!("{} {} ({}) {}", marker, project.name, project.slug, project.id);
        }

        Ok(())
    }
}
