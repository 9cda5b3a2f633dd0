use std::io;
use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::{Blob, BlobBackend, BlobKey, IoResultExt, DEFAULT_CONTENT_TYPE};

const DATA_DIR: &str = "data";
const META_DIR: &str = "meta";

/// `BlobBackend` that stores each blob as a file below a root directory.
///
/// Payloads live in `<root>/data/<key>` and content types in
/// `<root>/meta/<key>`, so a key can never collide with the metadata of
/// another key.
pub struct StdBlobs {
    root: PathBuf,
}

impl StdBlobs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_in(&self, dir: &str, key: &BlobKey) -> PathBuf {
        let mut path = self.root.join(dir);
        for segment in key.segments() {
            path.push(segment);
        }
        path
    }

    fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    /// Removes directories emptied by a delete, stopping at `stop`.
    fn prune_empty_parents(path: &Path, stop: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == stop {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the walk.
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    fn collect_keys(&self, dir: &Path, prefix: &str, out: &mut Vec<BlobKey>) -> io::Result<()> {
        let entries = match fs::read_dir(dir).with_not_found()? {
            Some(entries) => entries,
            None => return Ok(()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type()?.is_dir() {
                self.collect_keys(&path, prefix, out)?;
                continue;
            }

            let data_root = self.root.join(DATA_DIR);
            let relative = match path.strip_prefix(&data_root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };

            let raw = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match BlobKey::new(raw) {
                Ok(key) if key.as_str().starts_with(prefix) => out.push(key),
                Ok(_) => {}
                Err(err) => log::warn!("Ignoring unexpected file in blob store: {}", err),
            }
        }

        Ok(())
    }
}

impl BlobBackend for StdBlobs {
    fn put(&mut self, key: &BlobKey, data: &[u8], content_type: &str) -> io::Result<()> {
        Self::write_file(&self.path_in(DATA_DIR, key), data)?;
        Self::write_file(&self.path_in(META_DIR, key), content_type.as_bytes())
    }

    fn get(&mut self, key: &BlobKey) -> io::Result<Blob> {
        let data = fs::read(self.path_in(DATA_DIR, key))?;
        let content_type = fs::read_to_string(self.path_in(META_DIR, key))
            .with_not_found()?
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());

        Ok(Blob { data, content_type })
    }

    fn delete(&mut self, key: &BlobKey) -> io::Result<()> {
        let data_path = self.path_in(DATA_DIR, key);
        fs::remove_file(&data_path)?;
        Self::prune_empty_parents(&data_path, &self.root.join(DATA_DIR));

        let meta_path = self.path_in(META_DIR, key);
        fs::remove_file(&meta_path).with_not_found()?;
        Self::prune_empty_parents(&meta_path, &self.root.join(META_DIR));

        Ok(())
    }

    fn exists(&mut self, key: &BlobKey) -> io::Result<bool> {
        let path = self.path_in(DATA_DIR, key);
        match fs::metadata(&path).with_not_found()? {
            Some(meta) => Ok(meta.is_file()),
            None => Ok(false),
        }
    }

    fn keys(&mut self, prefix: &str) -> io::Result<Vec<BlobKey>> {
        let mut keys = Vec::new();
        let data_root = self.root.join(DATA_DIR);
        self.collect_keys(&data_root, prefix, &mut keys)?;
        Ok(keys)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Blobs;

    #[test]
    fn round_trips_payload_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Blobs::new(StdBlobs::new(dir.path()));
        let key = BlobKey::new("projects/p/files/1-index.html").unwrap();

        blobs.put(&key, "<html></html>", "text/html").unwrap();

        let blob = blobs.get(&key).unwrap();
        assert_eq!(blob.data, b"<html></html>");
        assert_eq!(blob.content_type, "text/html");
        assert!(dir
            .path()
            .join("data/projects/p/files/1-index.html")
            .is_file());
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Blobs::new(StdBlobs::new(dir.path()));
        let key = BlobKey::new("projects/p/files/x").unwrap();

        blobs.put(&key, "x", "text/plain").unwrap();
        blobs.delete(&key).unwrap();

        assert!(!blobs.exists(&key).unwrap());
        assert!(!dir.path().join("data/projects").exists());
        assert!(dir.path().join("data").exists());
    }

    #[test]
    fn keys_lists_nested_blobs_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Blobs::new(StdBlobs::new(dir.path()));

        for raw in ["projects/a/files/1", "projects/a/files/2", "projects/b/files/3"] {
            blobs.put(&BlobKey::new(raw).unwrap(), "x", "text/plain").unwrap();
        }

        let keys: Vec<String> = blobs
            .keys("projects/a/")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, vec!["projects/a/files/1", "projects/a/files/2"]);
    }

    #[test]
    fn keys_on_empty_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Blobs::new(StdBlobs::new(dir.path().join("never-created")));
        assert!(blobs.keys("").unwrap().is_empty());
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Blobs::new(StdBlobs::new(dir.path()));
        let err = blobs.get(&BlobKey::new("nope").unwrap()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
