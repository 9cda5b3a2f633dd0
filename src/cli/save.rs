use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use crate::{
    session::{SaveOutcome, SaveTrigger},
    workspace::Workspace,
};

use super::resolve_workspace_dir;

/// Saves the files of a workspace into its stored project.
#[derive(Debug, Parser)]
pub struct SaveCommand {
    /// Path to the workspace. Defaults to the current directory.
    #[clap(default_value = ".")]
    pub path: PathBuf,
}

impl SaveCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let base_path = resolve_workspace_dir(&self.path);
        let workspace = Workspace::open(&base_path)?;
        let session = workspace.session()?;

        let snapshot = workspace.read_snapshot()?;
        let report = match session.save(&snapshot, SaveTrigger::Manual)? {
            SaveOutcome::Saved(report) => report,
            SaveOutcome::Busy => bail!("Another save of this project is still running"),
        };

        for path in &report.skipped {
            log::warn!("Skipped {}, it has no content", path);
        }

        if report.is_empty() {
            println!("Everything is up to date");
        } else {
            println!("{}", report);
        }

        Ok(())
    }
}
