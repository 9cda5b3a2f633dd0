use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::{select, Receiver};
use notify::{EventKind, RecursiveMode, Watcher};

use crate::{
    session::{AutoSaveEvent, AutoSaver},
    workspace::Workspace,
};

use super::resolve_workspace_dir;

/// Watches a workspace and saves changes once edits settle.
#[derive(Debug, Parser)]
pub struct WatchCommand {
    /// Path to the workspace. Defaults to the current directory.
    #[clap(default_value = ".")]
    pub path: PathBuf,

    /// How long edits must settle before saving, like '3s' or '500ms'.
    /// Defaults to `autoSave.debounceMs` from the config.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub debounce: Option<Duration>,
}

impl WatchCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let base_path = resolve_workspace_dir(&self.path);
        let workspace = Workspace::open(&base_path)?;

        if !workspace.config().auto_save.enabled {
            bail!("Auto-save is turned off in this workspace's config");
        }
        let debounce = self
            .debounce
            .unwrap_or_else(|| workspace.config().auto_save.debounce());

        let session = Arc::new(workspace.session()?);
        session
            .initial_sync(&workspace.read_snapshot()?)
            .context("Initial sync failed")?;

        let (fs_sender, fs_receiver) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let _ = fs_sender.send(event);
        })
        .context("Could not start the file watcher")?;
        watcher
            .watch(&base_path, RecursiveMode::Recursive)
            .with_context(|| format!("Could not watch {}", base_path.display()))?;

        let saver = AutoSaver::start(Arc::clone(&session), debounce);

        log::info!(
            "Watching {} (saving {} after the last change)",
            base_path.display(),
            humantime::format_duration(debounce)
        );

        let result = watch_loop(&workspace, &saver, &fs_receiver);
        session.close();
        result
    }
}

fn watch_loop(
    workspace: &Workspace,
    saver: &AutoSaver,
    fs_receiver: &Receiver<notify::Result<notify::Event>>,
) -> anyhow::Result<()> {
    let events = saver.events();

    loop {
        select! {
            recv(fs_receiver) -> event => {
                match event? {
                    Ok(event) if is_relevant(workspace, &event) => {
                        log::trace!("File change: {:?}", event);
                        match workspace.read_snapshot() {
                            Ok(snapshot) => {
                                saver.update(snapshot);
                            }
                            Err(err) => log::warn!("Could not read the workspace: {:#}", err),
                        }
                    }
                    Ok(_) => {}
                    Err(err) => log::warn!("File watcher error: {}", err),
                }
            },
            recv(events) -> event => match event? {
                AutoSaveEvent::Started => log::debug!("Saving..."),
                AutoSaveEvent::Saved { operations } => {
                    if operations > 0 {
                        println!("Saved {} change(s)", operations);
                    }
                }
                AutoSaveEvent::Deferred => log::debug!("Save deferred, another save is running"),
                AutoSaveEvent::Failed { message } => println!("Save failed: {}", message),
            },
        }
    }
}

/// Whether an event touches a path that ends up in a snapshot.
fn is_relevant(workspace: &Workspace, event: &notify::Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }

    event.paths.iter().any(|path| {
        path.strip_prefix(workspace.root())
            .ok()
            .and_then(|relative| relative.to_str())
            .is_some_and(|relative| {
                let relative = relative.replace('\\', "/");
                !relative.is_empty() && !workspace.ignore().is_match(&relative)
            })
    })
}
