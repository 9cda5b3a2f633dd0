use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use crate::{
    config::{WorkspaceConfig, CONFIG_FILE_NAME},
    project::{NewProject, Template},
    session::SaveOutcome,
    template::starter_files,
    workspace::Workspace,
};

use super::resolve_path;

/// Creates a project in a new workspace and checks out its starter files.
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Path to the workspace to create. Defaults to the current directory.
    #[clap(default_value = ".")]
    pub path: PathBuf,

    /// Display name of the project. Defaults to the directory name.
    #[clap(long)]
    pub name: Option<String>,

    /// The starter template, like 'react', 'vue' or 'node'.
    #[clap(long, default_value = "react")]
    pub template: Template,

    /// The user who owns the project.
    #[clap(long)]
    pub owner: Option<String>,
}

impl InitCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let base_path = resolve_path(&self.path).into_owned();

        if base_path.join(CONFIG_FILE_NAME).exists() {
            bail!(
                "{} already contains a {}",
                base_path.display(),
                CONFIG_FILE_NAME
            );
        }
        fs_err::create_dir_all(&base_path)?;

        let name = match self.name {
            Some(name) => name,
            None => base_path
                .file_name()
                .and_then(|name| name.to_str())
                .context("Could not pick a project name from the path, pass --name")?
                .to_owned(),
        };

        let mut config = WorkspaceConfig::new(name.clone());
        config.template = self.template;
        if let Some(owner) = self.owner {
            config.owner = owner;
        }

        let mut workspace = Workspace::with_config(&base_path, config)?;
        let project = workspace
            .projects()
            .create(
                &workspace.config().owner,
                NewProject {
                    name,
                    template: self.template,
                    ..Default::default()
                },
            )
            .context("Could not create the project")?;
        workspace.bind_project(project.id)?;

        match starter_files(self.template, &project.name) {
            Some(starter) => {
                let session = workspace.session()?;
                if let SaveOutcome::Saved(report) = session.initial_sync(&starter)? {
                    log::debug!("Seeded project:\n{}", report);
                }
            }
            None => log::info!(
                "The {} template has no built-in starter files",
                self.template
            ),
        }

        let stats = workspace.checkout(&base_path, false)?;

        println!(
            "Created project '{}' ({}) in {}",
            project.name,
            project.id,
            base_path.display()
        );
        println!("Wrote {} file(s)", stats.written);

        Ok(())
    }
}
