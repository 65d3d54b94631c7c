//! Archive extraction for downloaded toolchains.
//!
//! Toolchain archives are gzip-compressed tarballs. Entries are unpacked one
//! at a time so each path can be checked before anything touches the disk.

use anyhow::Result;
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use super::paths::ENTRY_POINT;
use crate::errors::BootstrapError;

/// Extracts a tar.gz archive to the destination directory.
///
/// Creates the destination directory if it does not exist. If all entries
/// share one root folder it is stripped, so `dotnet-sdk/dotnet` and
/// `./dotnet` both land at `dest_dir/dotnet`.
///
/// # Errors
///
/// Returns an `Extraction` error if the archive cannot be read, contains an
/// absolute or parent-relative path, or an entry cannot be written.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let fail = |message: String| BootstrapError::extraction(archive_path, message);

    std::fs::create_dir_all(dest_dir)
        .map_err(|e| fail(format!("cannot create {}: {e}", dest_dir.display())))?;

    let strip_prefix = find_common_root_folder(archive_path)?;

    let file = std::fs::File::open(archive_path).map_err(|e| fail(e.to_string()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries().map_err(|e| fail(e.to_string()))? {
        let mut entry = entry.map_err(|e| fail(e.to_string()))?;
        let entry_path = entry.path().map_err(|e| fail(e.to_string()))?.into_owned();

        if !is_contained(&entry_path) {
            return Err(fail(format!(
                "refusing to extract path with parent directory or absolute reference: {}",
                entry_path.display()
            ))
            .into());
        }

        let relative_path = match strip_prefix.as_deref().map(|p| entry_path.strip_prefix(p)) {
            Some(Ok(p)) if p.as_os_str().is_empty() => continue,
            Some(Ok(p)) => p.to_path_buf(),
            _ => entry_path,
        };
        if relative_path.as_os_str().is_empty() || relative_path == Path::new(".") {
            continue;
        }

        let output_path = dest_dir.join(&relative_path);

        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&output_path)
                .map_err(|e| fail(format!("cannot create {}: {e}", output_path.display())))?;
        } else {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| fail(format!("cannot create {}: {e}", parent.display())))?;
            }
            entry
                .unpack(&output_path)
                .map_err(|e| fail(format!("cannot write {}: {e}", output_path.display())))?;
        }
    }

    Ok(())
}

fn is_contained(path: &Path) -> bool {
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Finds a root folder shared by every entry.
///
/// Only reported when at least one entry is nested below it, so an archive
/// holding a single flat file keeps that file.
fn find_common_root_folder(archive_path: &Path) -> Result<Option<PathBuf>> {
    let fail = |message: String| BootstrapError::extraction(archive_path, message);

    let file = std::fs::File::open(archive_path).map_err(|e| fail(e.to_string()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut common_root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for entry in archive.entries().map_err(|e| fail(e.to_string()))? {
        let entry = entry.map_err(|e| fail(e.to_string()))?;
        let path = entry.path().map_err(|e| fail(e.to_string()))?;

        if path.components().count() > 1 {
            has_nested_entries = true;
        }

        let Some(first_component) = path.components().next() else {
            continue;
        };
        let root = PathBuf::from(first_component.as_os_str());

        match &common_root {
            None => common_root = Some(root),
            Some(existing) if existing != &root => return Ok(None),
            Some(_) => {}
        }
    }

    Ok(common_root.filter(|_| has_nested_entries))
}

/// Marks the toolchain entry point in `dir` as executable (Unix only).
///
/// # Errors
///
/// Returns a `Filesystem` error if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_executable_permissions(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let entry_point = dir.join(ENTRY_POINT);
    if entry_point.is_file() {
        let mut perms = std::fs::metadata(&entry_point)
            .map_err(|e| BootstrapError::filesystem(&entry_point, e.to_string()))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&entry_point, perms)
            .map_err(|e| BootstrapError::filesystem(&entry_point, e.to_string()))?;
    }
    Ok(())
}

/// Marks the toolchain entry point as executable (no-op off Unix).
#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
pub fn set_executable_permissions(_dir: &Path) -> Result<()> {
    Ok(())
}
