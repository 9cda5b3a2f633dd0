use std::{io::Write, path::PathBuf};

use clap::Parser;
use termcolor::{BufferWriter, Buffer, Color, ColorSpec, WriteColor};

use crate::{node::NodeKind, projection::TreeItem, workspace::Workspace};

use super::{resolve_workspace_dir, GlobalOptions};

/// Prints the stored project as a tree, folders first.
#[derive(Debug, Parser)]
pub struct TreeCommand {
    /// Path to the workspace. Defaults to the current directory.
    #[clap(default_value = ".")]
    pub path: PathBuf,

    /// Also print node ids.
    #[clap(long)]
    pub ids: bool,
}

impl TreeCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let base_path = resolve_workspace_dir(&self.path);
        let workspace = Workspace::open(&base_path)?;
        let project = workspace.project()?;
        let projection = workspace.session()?.projection()?;

        let writer = BufferWriter::stdout(global.color.into());
        let mut buffer = writer.buffer();

        writeln!(&mut buffer, "{} ({})", project.name, project.slug)?;
        for item in &projection.hierarchy {
            self.print_item(&mut buffer, item, 1)?;
        }

        buffer.set_color(&ColorSpec::new())?;
        writer.print(&buffer)?;
        Ok(())
    }

    fn print_item(&self, buffer: &mut Buffer, item: &TreeItem, depth: usize) -> anyhow::Result<()> {
        let mut color = ColorSpec::new();
        if item.kind == NodeKind::Folder {
            color.set_fg(Some(Color::Blue)).set_bold(true);
        }

        write!(buffer, "{}", "  ".repeat(depth))?;
        buffer.set_color(&color)?;
        write!(buffer, "{}", item.name)?;
        if item.kind == NodeKind::Folder {
            write!(buffer, "/")?;
        }
        buffer.reset()?;

        if self.ids {
            write!(buffer, "  {}", item.id)?;
        }
        writeln!(buffer)?;

        for child in &item.children {
            self.print_item(buffer, child, depth + 1)?;
        }

        Ok(())
    }
}
