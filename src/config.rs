//! The `canopy.json5` file that ties a directory to a stored project.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{node::ProjectId, project::Template};

pub const CONFIG_FILE_NAME: &str = "canopy.json5";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub name: String,

    /// Filled in once the project has been created in the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default)]
    pub template: Template,

    #[serde(default)]
    pub auto_save: AutoSaveConfig,

    /// Where records and blobs are kept, relative to the workspace.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Globs, relative to the workspace, of paths that are never read into
    /// a snapshot. A pattern ending in `/**` ignores the directory itself
    /// too.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Level for the rolling file log: `none`, `off`, `error`, `warn`,
    /// `info`, `debug` or `trace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_owner() -> String {
    "local".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    3000
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".canopy").join("store")
}

fn default_ignore() -> Vec<String> {
    vec![
        "node_modules/**".to_owned(),
        ".git/**".to_owned(),
        ".canopy/**".to_owned(),
    ]
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no canopy.json5 found in {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("invalid ignore pattern {pattern:?}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error(transparent)]
    Io {
        #[from]
        source: io::Error,
    },

    #[error(transparent)]
    Other {
        #[from]
        source: anyhow::Error,
    },
}

impl WorkspaceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_id: None,
            owner: default_owner(),
            template: Template::default(),
            auto_save: AutoSaveConfig::default(),
            storage_dir: default_storage_dir(),
            ignore: default_ignore(),
            file_log_level: None,
        }
    }

    /// Reads `canopy.json5` from a workspace directory.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: dir.to_path_buf(),
            });
        }

        let contents = fs_err::read(&path)?;
        let config = crate::json::from_slice_with_context(&contents, || {
            format!("Error parsing {}", path.display())
        })?;

        log::debug!("Loaded workspace config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        let serialized = crate::json::to_string_pretty_sorted(self)?;
        fs_err::write(&path, serialized)?;

        log::debug!("Wrote workspace config to {}", path.display());
        Ok(())
    }

    pub fn storage_path(&self, dir: &Path) -> PathBuf {
        if self.storage_dir.is_absolute() {
            self.storage_dir.clone()
        } else {
            dir.join(&self.storage_dir)
        }
    }

    /// Compiles the ignore globs. The config file itself is always ignored.
    pub fn ignore_set(&self) -> Result<GlobSet, ConfigError> {
        let glob = |pattern: &str| {
            Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.to_owned(),
                source,
            })
        };

        let mut builder = GlobSetBuilder::new();
        builder.add(glob(CONFIG_FILE_NAME)?);

        for pattern in &self.ignore {
            builder.add(glob(pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**") {
                builder.add(glob(dir)?);
            }
        }

        builder.build().map_err(|source| ConfigError::Glob {
            pattern: self.ignore.join(", "),
            source,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(
            dir.path().join(CONFIG_FILE_NAME),
            "{\n  // only the name is required\n  name: 'Demo',\n}",
        )
        .unwrap();

        let config = WorkspaceConfig::load(dir.path()).unwrap();
        assert_eq!(config, WorkspaceConfig::new("Demo"));
        assert_eq!(config.auto_save.debounce(), Duration::from_secs(3));
        assert_eq!(
            config.storage_path(dir.path()),
            dir.path().join(".canopy").join("store")
        );
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = WorkspaceConfig::new("Demo");
        config.project_id = Some(ProjectId::new());
        config.template = Template::Vue;
        config.auto_save.debounce_ms = 500;
        config.file_log_level = Some("warn".to_owned());
        config.save(dir.path()).unwrap();

        assert_eq!(WorkspaceConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn saved_keys_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        WorkspaceConfig::new("Demo").save(dir.path()).unwrap();

        let contents = fs_err::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        insta::assert_snapshot!(contents, @r#"
        {
          "autoSave": {
            "debounceMs": 3000,
            "enabled": true
          },
          "ignore": [
            "node_modules/**",
            ".git/**",
            ".canopy/**"
          ],
          "name": "Demo",
          "owner": "local",
          "storageDir": ".canopy/store",
          "template": "react"
        }
        "#);
    }

    #[test]
    fn missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkspaceConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join(CONFIG_FILE_NAME), "{ name: ").unwrap();

        let err = WorkspaceConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn ignore_patterns_cover_their_directory() {
        let set = WorkspaceConfig::new("Demo").ignore_set().unwrap();

        assert!(set.is_match(CONFIG_FILE_NAME));
        assert!(set.is_match("node_modules"));
        assert!(set.is_match("node_modules/react/index.js"));
        assert!(set.is_match(".canopy/store/documents.json"));
        assert!(!set.is_match("src/node_modules.js"));
        assert!(!set.is_match("src/index.js"));
    }

    #[test]
    fn invalid_ignore_pattern() {
        let mut config = WorkspaceConfig::new("Demo");
        config.ignore = vec!["a/[".to_owned()];

        match config.ignore_set().unwrap_err() {
            ConfigError::Glob { pattern, .. } => assert_eq!(pattern, "a/["),
            other => panic!("unexpected error {}", other),
        }
    }
}
