use std::path::PathBuf;

use clap::Parser;

use crate::workspace::Workspace;

use super::{resolve_path, resolve_workspace_dir};

/// Writes the stored project into the workspace directory.
#[derive(Debug, Parser)]
pub struct CheckoutCommand {
    /// Path to the workspace. Defaults to the current directory.
    #[clap(default_value = ".")]
    pub path: PathBuf,

    /// Write somewhere other than the workspace itself.
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Remove files that aren't part of the stored project.
    #[clap(long)]
    pub clean: bool,
}

impl CheckoutCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let base_path = resolve_workspace_dir(&self.path);
        let workspace = Workspace::open(&base_path)?;

        let output = match &self.output {
            Some(output) => resolve_path(output).into_owned(),
            None => base_path,
        };

        let stats = workspace.checkout(&output, self.clean)?;
        println!(
            "Wrote {} file(s), {} unchanged, {} removed",
            stats.written, stats.unchanged, stats.removed
        );

        Ok(())
    }
}
