//! Per-request temporary files.
//!
//! # Design
//!
//! - Every path lives directly under the manager's root and embeds a fresh UUID.
//! - A handle owns exactly one path. `create` may run once; a second call is a fault.
//! - `release` is idempotent, ignores missing files and logs other failures. A handle
//!   dropped without release removes its file synchronously as a last resort.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{FsOpsError, FsOpsResult};
use crate::filename::{SanitizedName, sanitize_filename};
use crate::mime::extension_for_media_type;

/// Owns one temporary path for the lifetime of one request.
#[derive(Debug)]
pub struct TempFileHandle {
    path: PathBuf,
    created: bool,
    released: bool,
}

impl TempFileHandle {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            created: false,
            released: false,
        }
    }

    /// Path owned by this handle.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether content was written through [`Self::create`].
    #[must_use]
    pub const fn is_created(&self) -> bool {
        self.created
    }

    /// Whether [`Self::release`] has run.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Write the handle's content. Fails if the path already exists.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::CreateCalledTwice`] on a second call and
    /// [`FsOpsError::Io`] when the file cannot be written.
    pub async fn create(&mut self, bytes: &[u8]) -> FsOpsResult<()> {
        if self.created || self.released {
            return Err(FsOpsError::CreateCalledTwice {
                path: self.path.clone(),
            });
        }
        self.created = true;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
            .map_err(|source| FsOpsError::io("temp.create", &self.path, source))?;
        file.write_all(bytes)
            .await
            .map_err(|source| FsOpsError::io("temp.write", &self.path, source))?;
        file.flush()
            .await
            .map_err(|source| FsOpsError::io("temp.flush", &self.path, source))?;
        Ok(())
    }

    /// Read back the handle's content.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the file is missing or unreadable.
    pub async fn read(&self) -> FsOpsResult<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| FsOpsError::io("temp.read", &self.path, source))
    }

    /// Whether a file currently exists at the handle's path.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Delete the file if present. Safe to call repeatedly or on a never-created handle.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "released temp file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "failed to delete temp file");
            }
        }
    }
}

impl Drop for TempFileHandle {
    fn drop(&mut self) {
        if !self.released {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "removed unreleased temp file"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    error!(path = %self.path.display(), error = %err, "failed to delete temp file");
                }
            }
        }
    }
}

/// A source handle plus the sanitised caller filename it was derived from.
#[derive(Debug)]
pub struct AcquiredSource {
    /// Handle holding the source bytes.
    pub handle: TempFileHandle,
    /// Caller filename after sanitisation, when one was supplied.
    pub name: Option<SanitizedName>,
}

/// Creates handles inside a single managed directory.
#[derive(Debug, Clone)]
pub struct TempFileManager {
    root: PathBuf,
}

impl TempFileManager {
    /// Use `root` as the managed directory, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> FsOpsResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|source| FsOpsError::io("temp.create_root", &root, source))?;
        Ok(Self { root })
    }

    /// Managed directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Materialise source bytes.
    ///
    /// With a raw filename, its final segment supplies the extension; without one the
    /// extension comes from the mimetype.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InvalidFilename`] for unusable names and
    /// [`FsOpsError::Io`] when the content cannot be written.
    pub async fn acquire_source(
        &self,
        raw_filename: Option<&str>,
        media_type: &str,
        bytes: &[u8],
    ) -> FsOpsResult<AcquiredSource> {
        let name = raw_filename.map(sanitize_filename).transpose()?;
        let extension = name
            .as_ref()
            .and_then(|name| name.extension.clone())
            .unwrap_or_else(|| extension_for_media_type(media_type).to_owned());
        let mut handle = self.allocate("source", &extension);
        handle.create(bytes).await?;
        Ok(AcquiredSource { handle, name })
    }

    /// Empty source handle for content fetched from elsewhere.
    #[must_use]
    pub fn reserve_source(&self, media_type: &str) -> TempFileHandle {
        self.allocate("source", extension_for_media_type(media_type))
    }

    /// Reserve a target path; the transformer creates the file.
    #[must_use]
    pub fn acquire_target(
        &self,
        source_media_type: &str,
        target_media_type: &str,
    ) -> TempFileHandle {
        let handle = self.allocate("target", extension_for_media_type(target_media_type));
        debug!(
            source_media_type,
            target_media_type,
            path = %handle.path().display(),
            "reserved target file"
        );
        handle
    }

    fn allocate(&self, prefix: &str, extension: &str) -> TempFileHandle {
        let name = format!("{prefix}_{}.{extension}", Uuid::new_v4());
        TempFileHandle::new(self.root.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[tokio::test]
    async fn source_is_created_inside_root_regardless_of_caller_path() -> Result<(), Box<dyn Error>>
    {
        let dir = tempfile::tempdir()?;
        let manager = TempFileManager::new(dir.path())?;

        let mut acquired = manager
            .acquire_source(Some("../../etc/quick.pdf"), "application/pdf", b"%PDF")
            .await?;
        assert_eq!(acquired.handle.path().parent(), Some(dir.path()));
        assert_eq!(
            acquired.handle.path().extension().and_then(|e| e.to_str()),
            Some("pdf")
        );
        assert_eq!(acquired.handle.read().await?, b"%PDF");

        acquired.handle.release().await;
        assert!(!acquired.handle.exists().await);
        Ok(())
    }

    #[tokio::test]
    async fn create_twice_is_a_fault() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let manager = TempFileManager::new(dir.path())?;
        let mut handle = manager.reserve_source("text/plain");
        handle.create(b"one").await?;
        assert!(matches!(
            handle.create(b"two").await,
            Err(FsOpsError::CreateCalledTwice { .. })
        ));
        handle.release().await;
        Ok(())
    }

    #[tokio::test]
    async fn release_is_idempotent_and_tolerates_missing_files() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let manager = TempFileManager::new(dir.path())?;
        let mut target = manager.acquire_target("application/pdf", "text/plain");
        assert!(!target.is_created());
        target.release().await;
        target.release().await;
        assert!(target.is_released());
        assert!(matches!(
            target.create(b"late").await,
            Err(FsOpsError::CreateCalledTwice { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn paths_are_unique_per_handle() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let manager = TempFileManager::new(dir.path())?;
        let first = manager.acquire_target("a/a", "text/plain");
        let second = manager.acquire_target("a/a", "text/plain");
        assert_ne!(first.path(), second.path());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_handle_removes_its_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let manager = TempFileManager::new(dir.path())?;
        let acquired = manager.acquire_source(None, "text/plain", b"x").await?;
        let path = acquired.handle.path().to_path_buf();
        assert!(path.exists());
        drop(acquired);
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_name_creates_nothing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let manager = TempFileManager::new(dir.path())?;
        let result = manager.acquire_source(Some("abc/"), "text/plain", b"x").await;
        assert!(matches!(result, Err(FsOpsError::InvalidFilename { .. })));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
