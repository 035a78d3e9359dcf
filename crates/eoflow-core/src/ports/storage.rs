use crate::error::Result;

/// Port for byte-level blob storage.
///
/// Paths are opaque strings: local paths or object-store URIs. Adapters decide how to
/// interpret them. Implementations must be safe to call from worker threads.
pub trait ByteStore: Send + Sync {
    /// Read the whole blob at `path`
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write `bytes` to `path`, replacing any existing blob
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Check whether a blob exists at `path`
    fn exists(&self, path: &str) -> Result<bool>;

    /// Create a directory-like prefix, including parents. Succeeds if it already exists.
    fn mkdir(&self, path: &str) -> Result<()>;
}

/// Join path segments with a single `/`, keeping any URI scheme intact
pub fn join_path(base: &str, segment: &str) -> String {
    let segment = segment.trim_start_matches('/');
    if base.is_empty() {
        return segment.to_string();
    }
    if segment.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), segment)
}
