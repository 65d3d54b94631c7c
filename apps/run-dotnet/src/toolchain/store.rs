//! The shared artifact store.
//!
//! Archives and extracted installations are shared by every project on the
//! machine, so two runs may try to install the same version at once. Each
//! entry is guarded by an advisory lock under `locks/` and published with a
//! rename, which means anything visible at its final path is complete:
//!
//! - archives are downloaded to a temp file in `archives/`, verified, then
//!   renamed to their cache key
//! - installations are unpacked into a temp directory in `versions/<v>/`,
//!   checked for the entry point, then renamed into place

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;

use super::archive::{extract_tar_gz, set_executable_permissions};
use super::catalog::Asset;
use super::fetch::Fetcher;
use super::paths::{ENTRY_POINT, StorePaths};
use super::verify::verify_checksum;
use crate::errors::BootstrapError;

/// Exclusive advisory lock on one store entry, released on drop.
#[derive(Debug)]
struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Blocks until the lock at `path` is held.
    fn acquire_blocking(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BootstrapError::filesystem(parent, e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| BootstrapError::filesystem(path, e.to_string()))?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| BootstrapError::filesystem(path, format!("cannot lock: {e}")))?;
        Ok(Self { file })
    }

    /// Waits for the lock on a blocking thread.
    async fn acquire(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&path))
            .await
            .context("Lock task failed")?
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Content cache of downloaded archives and extracted installations.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: StorePaths,
    fetcher: Fetcher,
}

impl ArtifactStore {
    /// Creates a store over `paths`, downloading with `fetcher`.
    #[must_use]
    pub fn new(paths: StorePaths, fetcher: Fetcher) -> Self {
        Self { paths, fetcher }
    }

    /// Returns the store's directory layout.
    #[must_use]
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Returns the cache key of `asset`: the file name of its download URL.
    ///
    /// Published names follow `<product>-<version>-<platform>.tar.gz`, so the
    /// key is unique per artifact.
    #[must_use]
    pub fn cache_key(asset: &Asset) -> String {
        asset
            .file_name()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect()
    }

    /// Returns the archive for `asset`, downloading it if not yet cached.
    ///
    /// A cached archive is returned without any network access. A failed
    /// download or checksum leaves nothing at the cache path.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's `Network`, `Protocol` or `Integrity` errors,
    /// `ChecksumMismatch`, or a `Filesystem` error.
    pub async fn ensure_downloaded(&self, asset: &Asset) -> Result<PathBuf> {
        let key = Self::cache_key(asset);
        let dest = self.paths.archive_path(&key);
        if dest.is_file() {
            tracing::debug!(archive = %dest.display(), "archive cache hit");
            return Ok(dest);
        }

        self.paths.ensure_directories()?;
        let _lock = StoreLock::acquire(self.paths.lock_path(&key)).await?;
        if dest.is_file() {
            tracing::debug!(archive = %dest.display(), "archive downloaded by another process");
            return Ok(dest);
        }

        let partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&self.paths.archives)
            .map_err(|e| BootstrapError::filesystem(&self.paths.archives, e.to_string()))?
            .into_temp_path();

        tracing::info!(url = %asset.url, "downloading {}", asset.name);
        let bytes = self.fetcher.fetch_to_file(&asset.url, &partial).await?;

        if let Some(expected) = &asset.hash {
            verify_checksum(&partial, expected)?;
            tracing::debug!(archive = %key, "checksum verified");
        }

        partial
            .persist(&dest)
            .map_err(|e| BootstrapError::filesystem(&dest, e.error.to_string()))?;
        tracing::info!(archive = %dest.display(), bytes, "archive cached");
        Ok(dest)
    }

    /// Returns the installation directory for `archive_path`, unpacking it if needed.
    ///
    /// An installation counts as present when its entry point exists.
    ///
    /// # Errors
    ///
    /// Returns `Extraction` if unpacking fails or the archive has no entry
    /// point, or `Filesystem` if the directory cannot be published.
    pub async fn ensure_extracted(&self, archive_path: &Path, version: &str) -> Result<PathBuf> {
        let install_dir = self.paths.install_dir(version, archive_path)?;
        if install_dir.join(ENTRY_POINT).exists() {
            tracing::debug!(install_dir = %install_dir.display(), "installation cache hit");
            return Ok(install_dir);
        }

        let lock_key = format!(
            "{version}-{}",
            install_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let _lock = StoreLock::acquire(self.paths.lock_path(&lock_key)).await?;
        if install_dir.join(ENTRY_POINT).exists() {
            tracing::debug!(install_dir = %install_dir.display(), "installed by another process");
            return Ok(install_dir);
        }

        let version_dir = self.paths.version_dir(version)?;
        std::fs::create_dir_all(&version_dir)
            .map_err(|e| BootstrapError::filesystem(&version_dir, e.to_string()))?;
        if install_dir.exists() {
            tracing::warn!(install_dir = %install_dir.display(), "removing incomplete installation");
            std::fs::remove_dir_all(&install_dir)
                .map_err(|e| BootstrapError::filesystem(&install_dir, e.to_string()))?;
        }

        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(&version_dir)
            .map_err(|e| BootstrapError::filesystem(&version_dir, e.to_string()))?;

        tracing::info!(archive = %archive_path.display(), "extracting");
        let archive = archive_path.to_path_buf();
        let target = staging.path().to_path_buf();
        tokio::task::spawn_blocking(move || {
            extract_tar_gz(&archive, &target)?;
            set_executable_permissions(&target)
        })
        .await
        .context("Extraction task failed")??;

        if !staging.path().join(ENTRY_POINT).exists() {
            return Err(BootstrapError::extraction(
                archive_path,
                format!("archive does not contain '{ENTRY_POINT}'"),
            )
            .into());
        }

        std::fs::rename(staging.path(), &install_dir)
            .map_err(|e| BootstrapError::filesystem(&install_dir, e.to_string()))?;
        tracing::info!(install_dir = %install_dir.display(), "installed");
        Ok(install_dir)
    }
}
