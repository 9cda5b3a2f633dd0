/*!
Implementation of a blob store with a configurable backend.

blobfs stores opaque byte payloads under string keys, along with a content-type
hint for each payload. Its primary consumer is canopy, which keeps the content
of every project file in a blob and only the key in the file's record.

## Current Features
* Small API modeled after object stores (`put`, `get`, `delete`, `exists`, `keys`)
* Configurable backends
    * `StdBlobs`, which stores blobs as files under a root directory
    * `NoopBlobs`, which always throws errors
    * `InMemoryBlobs`, a simple in-memory store useful for testing
*/

mod in_memory;
mod key;
mod noop_backend;
mod std_backend;

use std::sync::{Arc, Mutex, MutexGuard};
use std::{io, str};

pub use in_memory::InMemoryBlobs;
pub use key::{BlobKey, BlobKeyError};
pub use noop_backend::NoopBlobs;
pub use std_backend::StdBlobs;

/// Content type used when the caller has no better guess.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

mod sealed {
    use super::*;

    /// Sealing trait for BlobBackend.
    pub trait Sealed {}

    impl Sealed for NoopBlobs {}
    impl Sealed for StdBlobs {}
    impl Sealed for InMemoryBlobs {}
}

/// Trait that transforms `io::Result<T>` into `io::Result<Option<T>>`.
///
/// `Ok(None)` takes the place of IO errors whose `io::ErrorKind` is `NotFound`.
pub trait IoResultExt<T> {
    fn with_not_found(self) -> io::Result<Option<T>>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_not_found(self) -> io::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(err) => {
                if err.kind() == io::ErrorKind::NotFound {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// A stored payload and the content type it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Backend that can be used to create a `Blobs`.
///
/// This trait is sealed and cannot not be implemented outside this crate.
pub trait BlobBackend: sealed::Sealed + Send + 'static {
    fn put(&mut self, key: &BlobKey, data: &[u8], content_type: &str) -> io::Result<()>;
    fn get(&mut self, key: &BlobKey) -> io::Result<Blob>;
    fn delete(&mut self, key: &BlobKey) -> io::Result<()>;
    fn exists(&mut self, key: &BlobKey) -> io::Result<bool>;
    fn keys(&mut self, prefix: &str) -> io::Result<Vec<BlobKey>>;
}

/// Contains implementation details of the store, wrapped by `Blobs` and
/// `BlobsLock`, the public interfaces to this type.
struct BlobsInner {
    backend: Box<dyn BlobBackend>,
}

impl BlobsInner {
    fn put<C: AsRef<[u8]>>(&mut self, key: &BlobKey, data: C, content_type: &str) -> io::Result<()> {
        let data = data.as_ref();
        log::trace!("put blob {} ({} bytes, {})", key, data.len(), content_type);
        self.backend.put(key, data, content_type)
    }

    fn get(&mut self, key: &BlobKey) -> io::Result<Arc<Blob>> {
        Ok(Arc::new(self.backend.get(key)?))
    }

    fn get_to_string(&mut self, key: &BlobKey) -> io::Result<Arc<String>> {
        let blob = self.backend.get(key)?;

        let contents = String::from_utf8(blob.data).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Blob was not valid UTF-8: {}", key),
            )
        })?;

        Ok(Arc::new(contents))
    }

    fn delete(&mut self, key: &BlobKey) -> io::Result<()> {
        log::trace!("delete blob {}", key);
        self.backend.delete(key)
    }

    fn exists(&mut self, key: &BlobKey) -> io::Result<bool> {
        self.backend.exists(key)
    }

    fn keys(&mut self, prefix: &str) -> io::Result<Vec<BlobKey>> {
        let mut keys = self.backend.keys(prefix)?;
        keys.sort();
        Ok(keys)
    }
}

/// A blob store with a configurable backend.
///
/// All operations on `Blobs` take a lock on an internal backend. For performing
/// large batches of operations, it might be more performant to call `lock()`
/// and use [`BlobsLock`](struct.BlobsLock.html) instead.
pub struct Blobs {
    inner: Mutex<BlobsInner>,
}

impl Blobs {
    /// Creates a new `Blobs` with the given backend.
    pub fn new<B: BlobBackend>(backend: B) -> Self {
        let lock = BlobsInner {
            backend: Box::new(backend),
        };

        Self {
            inner: Mutex::new(lock),
        }
    }

    /// Creates a new `Blobs` that keeps everything in memory.
    pub fn new_in_memory() -> Self {
        Self::new(InMemoryBlobs::new())
    }

    /// Manually lock the store, useful for large batches of operations.
    pub fn lock(&self) -> BlobsLock<'_> {
        BlobsLock {
            inner: self.inner.lock().unwrap(),
        }
    }

    /// Store `data` under `key`, replacing any previous payload.
    #[inline]
    pub fn put<C: AsRef<[u8]>>(&self, key: &BlobKey, data: C, content_type: &str) -> io::Result<()> {
        self.inner.lock().unwrap().put(key, data, content_type)
    }

    /// Read the payload and content type stored under `key`.
    ///
    /// Roughly equivalent to [`std::fs::read`][std::fs::read].
    ///
    /// [std::fs::read]: https://doc.rust-lang.org/stable/std/fs/fn.read.html
    #[inline]
    pub fn get(&self, key: &BlobKey) -> io::Result<Arc<Blob>> {
        self.inner.lock().unwrap().get(key)
    }

    /// Read the payload stored under `key` into a string.
    ///
    /// Returns an error with kind `InvalidData` if the payload is not UTF-8.
    #[inline]
    pub fn get_to_string(&self, key: &BlobKey) -> io::Result<Arc<String>> {
        self.inner.lock().unwrap().get_to_string(key)
    }

    /// Remove the payload stored under `key`.
    ///
    /// Returns an error with kind `NotFound` if nothing was stored there.
    #[inline]
    pub fn delete(&self, key: &BlobKey) -> io::Result<()> {
        self.inner.lock().unwrap().delete(key)
    }

    /// Tells whether anything is stored under `key`.
    #[inline]
    pub fn exists(&self, key: &BlobKey) -> io::Result<bool> {
        self.inner.lock().unwrap().exists(key)
    }

    /// Lists every key starting with `prefix`, sorted.
    #[inline]
    pub fn keys(&self, prefix: &str) -> io::Result<Vec<BlobKey>> {
        self.inner.lock().unwrap().keys(prefix)
    }
}

/// A locked handle to a [`Blobs`](struct.Blobs.html), created by `Blobs::lock`.
///
/// Implements roughly the same API as [`Blobs`](struct.Blobs.html).
pub struct BlobsLock<'a> {
    inner: MutexGuard<'a, BlobsInner>,
}

impl BlobsLock<'_> {
    #[inline]
    pub fn put<C: AsRef<[u8]>>(&mut self, key: &BlobKey, data: C, content_type: &str) -> io::Result<()> {
        self.inner.put(key, data, content_type)
    }

    #[inline]
    pub fn get(&mut self, key: &BlobKey) -> io::Result<Arc<Blob>> {
        self.inner.get(key)
    }

    #[inline]
    pub fn get_to_string(&mut self, key: &BlobKey) -> io::Result<Arc<String>> {
        self.inner.get_to_string(key)
    }

    #[inline]
    pub fn delete(&mut self, key: &BlobKey) -> io::Result<()> {
        self.inner.delete(key)
    }

    #[inline]
    pub fn exists(&mut self, key: &BlobKey) -> io::Result<bool> {
        self.inner.exists(key)
    }

    #[inline]
    pub fn keys(&mut self, prefix: &str) -> io::Result<Vec<BlobKey>> {
        self.inner.keys(prefix)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(raw: &str) -> BlobKey {
        BlobKey::new(raw).unwrap()
    }

    #[test]
    fn get_to_string_rejects_invalid_utf8() {
        let blobs = Blobs::new_in_memory();
        let k = key("bad.bin");
        blobs.put(&k, [0xffu8, 0xfe], "application/octet-stream").unwrap();

        let err = blobs.get_to_string(&k).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_blob_maps_to_none() {
        let blobs = Blobs::new_in_memory();
        let result = blobs.get(&key("nope")).with_not_found().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn keys_are_sorted() {
        let blobs = Blobs::new_in_memory();
        for raw in ["p/b", "p/a", "q/c", "p/c"] {
            blobs.put(&key(raw), "x", DEFAULT_CONTENT_TYPE).unwrap();
        }

        let keys: Vec<String> = blobs
            .keys("p/")
            .unwrap()
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["p/a", "p/b", "p/c"]);
    }

    #[test]
    fn noop_backend_fails_everything() {
        let blobs = Blobs::new(NoopBlobs::new());
        let k = key("a");

        assert!(blobs.put(&k, "1", DEFAULT_CONTENT_TYPE).is_err());
        assert!(blobs.exists(&k).is_err());
        assert!(blobs.keys("").is_err());

        // Only NotFound is swallowed by `with_not_found`.
        assert!(blobs.get(&k).with_not_found().is_err());
        assert!(blobs.delete(&k).with_not_found().is_err());
    }

    #[test]
    fn lock_batches_operations() {
        let blobs = Blobs::new_in_memory();
        {
            let mut lock = blobs.lock();
            lock.put(&key("a"), "1", DEFAULT_CONTENT_TYPE).unwrap();
            lock.put(&key("b"), "2", DEFAULT_CONTENT_TYPE).unwrap();
            lock.delete(&key("a")).unwrap();
        }

        assert!(!blobs.exists(&key("a")).unwrap());
        assert_eq!(blobs.get_to_string(&key("b")).unwrap().as_str(), "2");
    }
}
