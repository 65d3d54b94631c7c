//! The project-local installation view.
//!
//! `<project>/.dotnet/` mirrors the top level of one installation through
//! symlinks, so `.dotnet/dotnet` runs the selected toolchain. The pin file
//! is the only real file kept there and survives every refresh.

use std::path::Path;

use anyhow::Result;

use super::paths::{ENTRY_POINT, PIN_FILE};
use crate::errors::BootstrapError;

/// Points `view_dir` at `install_dir`.
///
/// Removes every entry of `view_dir` except the pin file, then links each
/// top-level entry of `install_dir` into it. Safe to call repeatedly.
///
/// # Errors
///
/// Returns `Filesystem` if an entry cannot be removed or linked, or if
/// `view_dir/dotnet` does not resolve afterwards.
pub fn refresh(install_dir: &Path, view_dir: &Path) -> Result<()> {
    let install_dir = std::fs::canonicalize(install_dir)
        .map_err(|e| BootstrapError::filesystem(install_dir, e.to_string()))?;
    std::fs::create_dir_all(view_dir)
        .map_err(|e| BootstrapError::filesystem(view_dir, e.to_string()))?;

    clear(view_dir)?;

    let mut entries: Vec<_> = std::fs::read_dir(&install_dir)
        .map_err(|e| BootstrapError::filesystem(&install_dir, e.to_string()))?
        .filter_map(Result::ok)
        .map(|e| e.file_name())
        .filter(|name| name != PIN_FILE)
        .collect();
    entries.sort();

    for name in &entries {
        create_link(&install_dir.join(name), &view_dir.join(name))?;
    }

    let entry_point = view_dir.join(ENTRY_POINT);
    if !entry_point.exists() {
        return Err(BootstrapError::filesystem(
            &entry_point,
            format!("entry point missing after linking {}", install_dir.display()),
        )
        .into());
    }

    tracing::debug!(
        view = %view_dir.display(),
        target = %install_dir.display(),
        entries = entries.len(),
        "view refreshed"
    );
    Ok(())
}

/// Removes everything in `view_dir` except the pin file.
fn clear(view_dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(view_dir)
        .map_err(|e| BootstrapError::filesystem(view_dir, e.to_string()))?;

    for entry in entries {
        let entry = entry.map_err(|e| BootstrapError::filesystem(view_dir, e.to_string()))?;
        if entry.file_name() == PIN_FILE {
            continue;
        }
        let path = entry.path();
        // symlink_metadata so broken links are removed rather than followed.
        let is_real_dir = path
            .symlink_metadata()
            .map(|m| m.file_type().is_dir())
            .unwrap_or(false);
        let removed = if is_real_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(|e| BootstrapError::filesystem(&path, e.to_string()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_link(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target).map_err(|e| {
        BootstrapError::filesystem(target, format!("cannot link to {}: {e}", source.display()))
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn create_link(_source: &Path, target: &Path) -> Result<()> {
    Err(BootstrapError::filesystem(target, "symbolic links are only supported on Unix").into())
}
