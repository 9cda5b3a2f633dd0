use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::{Blob, BlobBackend, BlobKey};

/// In-memory blob store, useful for testing.
///
/// Cloning an `InMemoryBlobs` yields a handle to the same storage, which
/// lets tests keep inspecting blobs after handing a clone to a [`Blobs`].
///
/// [`Blobs`]: crate::Blobs
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobs {
    inner: Arc<Mutex<BTreeMap<BlobKey, Blob>>>,
}

impl InMemoryBlobs {
    /// Create a new empty `InMemoryBlobs`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found(key: &BlobKey) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("blob not found: {}", key),
    )
}

impl BlobBackend for InMemoryBlobs {
    fn put(&mut self, key: &BlobKey, data: &[u8], content_type: &str) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(
            key.clone(),
            Blob {
                data: data.to_owned(),
                content_type: content_type.to_owned(),
            },
        );
        Ok(())
    }

    fn get(&mut self, key: &BlobKey) -> io::Result<Blob> {
        let inner = self.inner.lock().unwrap();
        inner.get(key).cloned().ok_or_else(|| not_found(key))
    }

    fn delete(&mut self, key: &BlobKey) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.remove(key).map(|_| ()).ok_or_else(|| not_found(key))
    }

    fn exists(&mut self, key: &BlobKey) -> io::Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.contains_key(key))
    }

    fn keys(&mut self, prefix: &str) -> io::Result<Vec<BlobKey>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .keys()
            .filter(|key| key.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Blobs;

    #[test]
    fn clones_share_storage() {
        let backend = InMemoryBlobs::new();
        let blobs = Blobs::new(backend.clone());
        let key = BlobKey::new("a/b.txt").unwrap();

        blobs.put(&key, "hello", "text/plain").unwrap();
        assert_eq!(backend.len(), 1);

        let blob = blobs.get(&key).unwrap();
        assert_eq!(blob.data, b"hello");
        assert_eq!(blob.content_type, "text/plain");
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut backend = InMemoryBlobs::new();
        let key = BlobKey::new("missing").unwrap();
        let err = backend.delete(&key).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
