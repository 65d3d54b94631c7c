//! Checksum verification for downloaded archives.
//!
//! Channel documents publish a SHA-512 digest for each file. When present it
//! is checked before an archive is admitted to the store.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha512};

use crate::errors::BootstrapError;

/// Verifies that a file matches the expected SHA-512 checksum.
///
/// The comparison ignores case and surrounding whitespace in `expected`.
///
/// # Errors
///
/// Returns `ChecksumMismatch` if the digests differ, or an I/O error if the
/// file cannot be read.
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<()> {
    let computed = compute_sha512(file_path)?;
    let expected = expected.trim().to_ascii_lowercase();

    if computed != expected {
        return Err(BootstrapError::checksum_mismatch(file_path, expected, computed).into());
    }
    Ok(())
}

/// Computes the SHA-512 hash of a file as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha512(file_path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open file for checksum: {}", file_path.display()))?;

    let mut hasher = Sha512::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).with_context(|| {
            format!("Failed to read file for checksum: {}", file_path.display())
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
