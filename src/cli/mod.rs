//! Defines Canopy's CLI through clap types.

mod checkout;
mod init;
mod projects;
mod save;
mod tree;
mod watch;

use std::{
    borrow::Cow,
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use thiserror::Error;

pub use self::checkout::CheckoutCommand;
pub use self::init::InitCommand;
pub use self::projects::ProjectsCommand;
pub use self::save::SaveCommand;
pub use self::tree::TreeCommand;
pub use self::watch::WatchCommand;

/// Command line options that Canopy accepts, defined using the clap crate.
#[derive(Debug, Parser)]
#[clap(name = "Canopy", version, about)]
pub struct Options {
    #[clap(flatten)]
    pub global: GlobalOptions,

    /// Subcommand to run in this invocation.
    #[clap(subcommand)]
    pub subcommand: Subcommand,
}

impl Options {
    pub fn run(self) -> anyhow::Result<()> {
        match self.subcommand {
            Subcommand::Init(subcommand) => subcommand.run(),
            Subcommand::Save(subcommand) => subcommand.run(),
            Subcommand::Checkout(subcommand) => subcommand.run(),
            Subcommand::Tree(subcommand) => subcommand.run(self.global),
            Subcommand::Watch(subcommand) => subcommand.run(),
            Subcommand::Projects(subcommand) => subcommand.run(),
        }
    }
}

#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Sets verbosity level. Can be specified multiple times.
    #[clap(long("verbose"), short, global(true), action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Set color behavior. Valid values are auto, always, and never.
    #[clap(long("color"), global(true), default_value("auto"))]
    pub color: ColorChoice,
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = ColorChoiceParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(ColorChoiceParseError {
                attempted: source.to_owned(),
            }),
        }
    }
}

impl From<ColorChoice> for termcolor::ColorChoice {
    fn from(value: ColorChoice) -> Self {
        match value {
            ColorChoice::Auto => termcolor::ColorChoice::Auto,
            ColorChoice::Always => termcolor::ColorChoice::Always,
            ColorChoice::Never => termcolor::ColorChoice::Never,
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid color choice '{attempted}'. Valid values are: auto, always, never")]
pub struct ColorChoiceParseError {
    attempted: String,
}

#[derive(Debug, Parser)]
pub enum Subcommand {
    Init(InitCommand),
    Save(SaveCommand),
    Checkout(CheckoutCommand),
    Tree(TreeCommand),
    Watch(WatchCommand),
    Projects(ProjectsCommand),
}

impl Subcommand {
    /// The workspace directory the command operates on.
    pub fn workspace_path(&self) -> &Path {
        match self {
            Subcommand::Init(cmd) => &cmd.path,
            Subcommand::Save(cmd) => &cmd.path,
            Subcommand::Checkout(cmd) => &cmd.path,
            Subcommand::Tree(cmd) => &cmd.path,
            Subcommand::Watch(cmd) => &cmd.path,
            Subcommand::Projects(cmd) => &cmd.path,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            Subcommand::Init(_) => "init",
            Subcommand::Save(_) => "save",
            Subcommand::Checkout(_) => "checkout",
            Subcommand::Tree(_) => "tree",
            Subcommand::Watch(_) => "watch",
            Subcommand::Projects(_) => "projects",
        }
    }
}

pub fn resolve_path(path: &Path) -> Cow<'_, Path> {
    if path.is_absolute() {
        Cow::Borrowed(path)
    } else {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Cow::Owned(current_dir.join(path))
    }
}

/// Resolves a workspace path, which may point at its `canopy.json5`, to the
/// workspace directory.
pub fn resolve_workspace_dir(path: &Path) -> PathBuf {
    let resolved = resolve_path(path);
    let resolved = resolved.as_ref();

    if resolved.is_file() {
        resolved
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| resolved.to_path_buf())
    } else if resolved.as_os_str().is_empty() {
        env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        resolved.to_path_buf()
    }
}
