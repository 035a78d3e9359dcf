use eoflow_core::error::{EoflowError, Result};
use eoflow_core::ports::ByteStore;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem-backed byte store.
///
/// Paths are resolved relative to the process working directory unless they are absolute.
/// A `file://` prefix is accepted and stripped. Writes go to a sibling temporary file that
/// is renamed into place, so readers never observe a partially written blob.
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }

    fn resolve(path: &str) -> PathBuf {
        PathBuf::from(path.strip_prefix("file://").unwrap_or(path))
    }

    fn storage_error(path: &Path, err: impl std::fmt::Display) -> EoflowError {
        EoflowError::Storage { path: path.display().to_string(), reason: err.to_string() }
    }
}

impl ByteStore for LocalStore {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = Self::resolve(path);
        fs::read(&resolved).map_err(|e| Self::storage_error(&resolved, e))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let resolved = Self::resolve(path);
        if let Some(parent) = resolved.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Self::storage_error(parent, e))?;
        }

        let file_name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Self::storage_error(&resolved, "path has no file name"))?;
        let staging = resolved.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        fs::write(&staging, bytes).map_err(|e| Self::storage_error(&staging, e))?;
        if let Err(e) = fs::rename(&staging, &resolved) {
            let _ = fs::remove_file(&staging);
            return Err(Self::storage_error(&resolved, e));
        }

        tracing::trace!(path = %resolved.display(), bytes = bytes.len(), "Wrote blob");
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Self::resolve(path).exists())
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let resolved = Self::resolve(path);
        fs::create_dir_all(&resolved).map_err(|e| Self::storage_error(&resolved, e))
    }
}
