use std::io;

use super::{Collections, DocumentBackend};

/// `DocumentBackend` that keeps nothing outside of memory.
#[derive(Debug, Default)]
pub struct InMemoryDocuments {
    seed: Option<Collections>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing records instead of an empty store.
    pub fn with_collections(collections: Collections) -> Self {
        Self {
            seed: Some(collections),
        }
    }
}

impl DocumentBackend for InMemoryDocuments {
    fn load(&mut self) -> io::Result<Collections> {
        Ok(self.seed.take().unwrap_or_default())
    }

    fn commit(&mut self, _collections: &Collections) -> io::Result<()> {
        Ok(())
    }
}
