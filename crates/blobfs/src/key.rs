use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque, validated key identifying one blob.
///
/// Keys are `/`-separated relative paths. They may not be empty, start with
/// a slash, contain backslashes, or contain empty, `.` or `..` segments, so
/// every key maps onto exactly one file below a backend's root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey(String);

impl BlobKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, BlobKeyError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(BlobKeyError::new(raw, "key is empty"));
        }

        if raw.contains('\\') {
            return Err(BlobKeyError::new(raw, "key contains a backslash"));
        }

        if raw.starts_with('/') {
            return Err(BlobKeyError::new(raw, "key must be relative"));
        }

        if raw
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(BlobKeyError::new(raw, "key has an empty or relative segment"));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the `/`-separated segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlobKey {
    type Error = BlobKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BlobKey> for String {
    fn from(value: BlobKey) -> Self {
        value.0
    }
}

/// Returned when a string can't be used as a [`BlobKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKeyError {
    key: String,
    reason: &'static str,
}

impl BlobKeyError {
    fn new(key: String, reason: &'static str) -> Self {
        Self { key, reason }
    }
}

impl fmt::Display for BlobKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid blob key {:?}: {}", self.key, self.reason)
    }
}

impl std::error::Error for BlobKeyError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        let key = BlobKey::new("projects/p1/files/abc-App.js").unwrap();
        assert_eq!(
            key.segments().collect::<Vec<_>>(),
            vec!["projects", "p1", "files", "abc-App.js"]
        );
    }

    #[test]
    fn rejects_escaping_keys() {
        for raw in ["", "/abs", "a//b", "a/../b", "./a", "a\\b", "a/"] {
            assert!(BlobKey::new(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<BlobKey, _> = serde_json::from_str("\"a/b\"");
        assert!(ok.is_ok());

        let bad: Result<BlobKey, _> = serde_json::from_str("\"../etc\"");
        assert!(bad.is_err());
    }
}
