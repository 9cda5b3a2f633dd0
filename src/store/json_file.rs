use std::{
    io,
    path::{Path, PathBuf},
};

use blobfs::IoResultExt;
use fs_err as fs;

use super::{Collections, DocumentBackend};

pub const DOCUMENTS_FILE_NAME: &str = "documents.json";

/// `DocumentBackend` that writes every collection to a single JSON file.
///
/// Each commit goes to a temporary file first and is then renamed over the
/// previous version, so a crash mid-write leaves the last good state behind.
#[derive(Debug)]
pub struct JsonDocuments {
    path: PathBuf,
}

impl JsonDocuments {
    /// Uses `documents.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(DOCUMENTS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentBackend for JsonDocuments {
    fn load(&mut self) -> io::Result<Collections> {
        let contents = match fs::read(&self.path).with_not_found()? {
            Some(contents) => contents,
            None => {
                log::debug!(
                    "No documents at {}, starting empty",
                    self.path.display()
                );
                return Ok(Collections::default());
            }
        };

        serde_json::from_slice(&contents).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is corrupt: {}", self.path.display(), err),
            )
        })
    }

    fn commit(&mut self, collections: &Collections) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_vec_pretty(collections)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, serialized)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}
