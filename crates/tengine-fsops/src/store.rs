//! Shared content store for reference-based requests.
//!
//! Queue and JSON requests carry a reference instead of bytes. The store resolves a
//! reference into a source handle and turns a produced target into a new reference.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FsOpsError, FsOpsResult};
use crate::temp::TempFileHandle;

/// Storage for source and target content addressed by opaque references.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Copy the referenced content into `into`, returning its length in bytes.
    async fn fetch(&self, reference: &str, into: &mut TempFileHandle) -> FsOpsResult<u64>;

    /// Persist the file at `path` and return its new reference.
    async fn store(&self, path: &Path, extension: &str) -> FsOpsResult<String>;
}

/// Filesystem-backed store; references are file names inside one directory.
#[derive(Debug, Clone)]
pub struct SharedFileStore {
    root: PathBuf,
}

impl SharedFileStore {
    /// Use `root` as the store directory, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> FsOpsResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|source| FsOpsError::io("store.create_root", &root, source))?;
        Ok(Self { root })
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store raw bytes under a fresh reference.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the content cannot be written.
    pub async fn put_bytes(&self, bytes: &[u8], extension: &str) -> FsOpsResult<String> {
        let reference = new_reference(extension);
        let path = self.root.join(&reference);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| FsOpsError::io("store.put", &path, source))?;
        Ok(reference)
    }

    /// Read stored content back.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::ReferenceNotFound`] for unknown references.
    pub async fn get_bytes(&self, reference: &str) -> FsOpsResult<Vec<u8>> {
        let path = self.resolve(reference)?;
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                FsOpsError::ReferenceNotFound {
                    reference: reference.to_owned(),
                }
            } else {
                FsOpsError::io("store.get", &path, source)
            }
        })
    }

    fn resolve(&self, reference: &str) -> FsOpsResult<PathBuf> {
        let invalid = |reason| FsOpsError::InvalidReference {
            reference: reference.to_owned(),
            reason,
        };
        if reference.trim().is_empty() {
            return Err(FsOpsError::MissingReference);
        }
        if reference.contains(['/', '\\']) {
            return Err(invalid("contains a path separator"));
        }
        if reference.starts_with('.') {
            return Err(invalid("starts with a dot"));
        }
        Ok(self.root.join(reference))
    }
}

#[async_trait]
impl ContentStore for SharedFileStore {
    async fn fetch(&self, reference: &str, into: &mut TempFileHandle) -> FsOpsResult<u64> {
        let bytes = self.get_bytes(reference).await?;
        into.create(&bytes).await?;
        debug!(reference, bytes = bytes.len(), "fetched source from store");
        Ok(bytes.len() as u64)
    }

    async fn store(&self, path: &Path, extension: &str) -> FsOpsResult<String> {
        let reference = new_reference(extension);
        let destination = self.root.join(&reference);
        tokio::fs::copy(path, &destination)
            .await
            .map_err(|source| FsOpsError::io("store.copy", path, source))?;
        debug!(reference, "stored target in store");
        Ok(reference)
    }
}

fn new_reference(extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        format!("{}.{extension}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::TempFileManager;
    use std::error::Error;

    #[tokio::test]
    async fn fetch_and_store_round_trip_through_temp_files() -> Result<(), Box<dyn Error>> {
        let store_dir = tempfile::tempdir()?;
        let work_dir = tempfile::tempdir()?;
        let store = SharedFileStore::new(store_dir.path())?;
        let manager = TempFileManager::new(work_dir.path())?;

        let reference = store.put_bytes(b"hello", "txt").await?;
        let mut handle = manager.reserve_source("text/plain");
        assert_eq!(store.fetch(&reference, &mut handle).await?, 5);

        let stored = store.store(handle.path(), "txt").await?;
        assert_ne!(stored, reference);
        assert_eq!(store.get_bytes(&stored).await?, b"hello");
        handle.release().await;
        Ok(())
    }

    #[tokio::test]
    async fn bad_references_are_caller_errors() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SharedFileStore::new(dir.path())?;

        assert!(matches!(
            store.get_bytes("").await,
            Err(FsOpsError::MissingReference)
        ));
        assert!(matches!(
            store.get_bytes("../secret").await,
            Err(FsOpsError::InvalidReference { .. })
        ));
        let missing = store.get_bytes("nope.txt").await;
        assert!(matches!(missing, Err(FsOpsError::ReferenceNotFound { .. })));
        if let Err(err) = missing {
            assert_eq!(err.to_string(), "source reference not found");
        }
        Ok(())
    }
}
