//! Path management for run-dotnet.
//!
//! Two trees are involved: a shared, user-scoped store reused by every
//! project on the machine, and a project-local view directory rebuilt on
//! every run.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/.local/share/run-dotnet/            # Store root (or RUN_DOTNET_HOME)
//!   archives/                           # Downloaded tarballs, keyed by file name
//!     dotnet-sdk-8.0.404-linux-x64.tar.gz
//!   versions/                           # Extracted installations
//!     8.0.11/
//!       dotnet-sdk-8.0.404-linux-x64/   # One directory per artifact shape
//!         dotnet
//!         sdk/ shared/ host/ ...
//!   cache/                              # Cached release metadata
//!   locks/                              # Advisory lock files
//!
//! <project>/.dotnet/                    # Installation view
//!   .pinned-major                       # Pin record (survives view refresh)
//!   dotnet -> <store>/versions/8.0.11/dotnet-sdk-8.0.404-linux-x64/dotnet
//!   sdk    -> ...
//! ```

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::errors::BootstrapError;

/// File name of the toolchain entry point.
pub const ENTRY_POINT: &str = "dotnet";

/// Name of the project-local view directory.
pub const VIEW_DIR: &str = ".dotnet";

/// Name of the pin record file inside the view directory.
pub const PIN_FILE: &str = ".pinned-major";

/// Suffix recognized for installable archives.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Paths of the shared artifact store.
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Store root.
    pub root: PathBuf,
    /// Directory of downloaded archives.
    pub archives: PathBuf,
    /// Directory of extracted installations.
    pub versions: PathBuf,
    /// Directory of cached metadata documents.
    pub cache: PathBuf,
    /// Directory of advisory lock files.
    pub locks: PathBuf,
}

impl StorePaths {
    /// Creates store paths under `root`.
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            archives: root.join("archives"),
            versions: root.join("versions"),
            cache: root.join("cache"),
            locks: root.join("locks"),
            root,
        }
    }

    /// Returns the cache path for an archive file name.
    #[must_use = "returns the path without side effects"]
    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.archives.join(file_name)
    }

    /// Returns the directory holding every installation of `version`.
    ///
    /// # Errors
    ///
    /// Returns `Filesystem` unless `version` is a single plain path
    /// component, so the result always stays under `versions/`.
    pub fn version_dir(&self, version: &str) -> Result<PathBuf> {
        let mut components = Path::new(version).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.versions.join(version)),
            _ => Err(BootstrapError::filesystem(
                &self.versions,
                format!("'{version}' cannot name a version directory"),
            )
            .into()),
        }
    }

    /// Returns the installation directory for the archive at `archive_path`.
    ///
    /// The archive base name (file name without `.tar.gz`) distinguishes
    /// SDK and runtime installs that share a release version.
    ///
    /// # Errors
    ///
    /// Returns `Filesystem` if `version` is rejected by [`Self::version_dir`].
    pub fn install_dir(&self, version: &str, archive_path: &Path) -> Result<PathBuf> {
        Ok(self.version_dir(version)?.join(archive_stem(archive_path)))
    }

    /// Returns the lock file path for a store key.
    #[must_use = "returns the path without side effects"]
    pub fn lock_path(&self, key: &str) -> PathBuf {
        self.locks.join(format!("{key}.lock"))
    }

    /// Ensures all store directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.root,
            &self.archives,
            &self.versions,
            &self.cache,
            &self.locks,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Paths owned by the current project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// Project root (the working directory).
    pub root: PathBuf,
    /// Installation view directory.
    pub view: PathBuf,
}

impl ProjectPaths {
    /// Creates project paths rooted at `root`.
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            view: root.join(VIEW_DIR),
            root,
        }
    }

    /// Returns the pin record path.
    #[must_use = "returns the path without side effects"]
    pub fn pin_file(&self) -> PathBuf {
        self.view.join(PIN_FILE)
    }

    /// Returns the entry point inside the view.
    #[must_use = "returns the path without side effects"]
    pub fn entry_point(&self) -> PathBuf {
        self.view.join(ENTRY_POINT)
    }
}

/// Strips `.tar.gz` (or any final extension) from an archive's file name.
fn archive_stem(archive_path: &Path) -> String {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(ARCHIVE_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name),
    }
}
