use std::io;

use crate::{Blob, BlobBackend, BlobKey};

/// `BlobBackend` that returns an error on every operation.
#[non_exhaustive]
pub struct NoopBlobs;

impl NoopBlobs {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopBlobs {
    fn default() -> Self {
        Self::new()
    }
}

fn unsupported() -> io::Error {
    io::Error::other("NoopBlobs doesn't store anything")
}

impl BlobBackend for NoopBlobs {
    fn put(&mut self, _key: &BlobKey, _data: &[u8], _content_type: &str) -> io::Result<()> {
        Err(unsupported())
    }

    fn get(&mut self, _key: &BlobKey) -> io::Result<Blob> {
        Err(unsupported())
    }

    fn delete(&mut self, _key: &BlobKey) -> io::Result<()> {
        Err(unsupported())
    }

    fn exists(&mut self, _key: &BlobKey) -> io::Result<bool> {
        Err(unsupported())
    }

    fn keys(&mut self, _prefix: &str) -> io::Result<Vec<BlobKey>> {
        Err(unsupported())
    }
}
