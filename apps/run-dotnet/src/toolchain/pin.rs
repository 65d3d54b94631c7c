//! Persisted major-version pin.
//!
//! The pin is a single integer stored in the project's view directory. It
//! is loaded once before resolution and written back only after a run has
//! fully succeeded, via a temp file renamed over the old one so readers
//! never observe a half-written value.

use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::errors::BootstrapError;

/// A persisted major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRecord {
    /// The pinned major version.
    pub major: u32,
}

impl PinRecord {
    /// Creates a pin for `major`.
    #[must_use]
    pub const fn new(major: u32) -> Self {
        Self { major }
    }

    /// Loads the pin from `path`.
    ///
    /// A missing file means no pin. A file whose content is not an integer is
    /// ignored with a warning; the next successful run overwrites it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read pin from {}", path.display()));
            }
        };

        if let Ok(major) = content.trim().parse() {
            Ok(Some(Self::new(major)))
        } else {
            tracing::warn!(path = %path.display(), "ignoring unreadable pin file");
            Ok(None)
        }
    }

    /// Writes the pin to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns a `Filesystem` error if the temp file cannot be written or renamed.
    pub fn save(self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| BootstrapError::filesystem(path, "pin path has no parent directory"))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| BootstrapError::filesystem(dir, e.to_string()))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".pin-")
            .tempfile_in(dir)
            .map_err(|e| BootstrapError::filesystem(dir, e.to_string()))?;
        writeln!(tmp, "{}", self.major).map_err(|e| BootstrapError::filesystem(tmp.path(), e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| BootstrapError::filesystem(path, e.error.to_string()))?;
        Ok(())
    }
}

impl fmt::Display for PinRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)
    }
}
