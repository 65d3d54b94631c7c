//! Error types for run-dotnet.
//!
//! `BootstrapError` names every way the bootstrap pipeline can fail. The
//! pipeline itself passes errors around as `anyhow::Error`; these typed
//! variants are raised through it so callers (and tests) can still tell a
//! redirect loop from a corrupt download via `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for the bootstrap pipeline.
///
/// None of these are retried. Every variant aborts the run with a non-zero
/// exit status; `ProcessExitCode` carries the child's own status through.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Connection, TLS or handshake failure.
    #[error("network error: {url}: {message}")]
    Network {
        /// The URL being requested.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Unexpected HTTP status, unsupported redirect target, or redirect loop.
    #[error("protocol error: {url}: {message}")]
    Protocol {
        /// The URL that produced the response.
        url: String,
        /// Description of what was unexpected.
        message: String,
    },

    /// Downloaded bytes are not a gzip stream.
    #[error("integrity error: {} is not a gzip archive", path.display())]
    Integrity {
        /// The file that failed validation.
        path: PathBuf,
    },

    /// Downloaded archive does not match the checksum published in the channel document.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        /// The file that was verified.
        path: PathBuf,
        /// The published SHA-512 digest.
        expected: String,
        /// The computed SHA-512 digest.
        actual: String,
    },

    /// A metadata document lacks its required top-level structure.
    #[error("malformed metadata from {source_name}: {message}")]
    MalformedMetadata {
        /// Where the document came from.
        source_name: String,
        /// Description of what is missing.
        message: String,
    },

    /// Implicit resolution found neither an active LTS nor an STS channel.
    #[error("no active LTS or STS channel found in the release index")]
    NoChannelFound,

    /// No channel matches the requested or pinned major version.
    #[error("no release channel found for major version {major}")]
    ChannelNotFound {
        /// The major version that was looked up.
        major: u32,
    },

    /// A major.minor request matched no release in its channel.
    #[error("no release matching {requested}.* in channel {channel}")]
    NoMatchingRelease {
        /// The `major.minor` prefix that was requested.
        requested: String,
        /// The channel that was searched.
        channel: String,
    },

    /// The resolved version is not listed in its channel.
    #[error("version {version} not found in channel {channel}")]
    VersionNotInChannel {
        /// The concrete version.
        version: String,
        /// The channel that was searched.
        channel: String,
    },

    /// The release exists but offers no installable asset for the platform.
    #[error("version {version} has no installable asset for {platform}")]
    AssetNotFound {
        /// The concrete version.
        version: String,
        /// The platform identifier.
        platform: String,
    },

    /// Unpacking an archive failed.
    #[error("extraction of {} failed: {message}", archive.display())]
    Extraction {
        /// The archive being unpacked.
        archive: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Directory creation, linking, or entry-point verification failed.
    #[error("filesystem error at {}: {message}", path.display())]
    Filesystem {
        /// The path involved.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Invalid command line arguments.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of what was invalid.
        message: String,
    },

    /// Subprocess exited with non-zero code.
    ///
    /// The child already printed its own output, so this is propagated as
    /// an exit code without an additional error message.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The exit code from the subprocess.
        code: i32,
    },
}

impl BootstrapError {
    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Protocol` error.
    #[must_use]
    pub fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Integrity` error.
    #[must_use]
    pub fn integrity(path: impl Into<PathBuf>) -> Self {
        Self::Integrity { path: path.into() }
    }

    /// Creates a new `ChecksumMismatch` error.
    #[must_use]
    pub fn checksum_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `MalformedMetadata` error.
    #[must_use]
    pub fn malformed_metadata(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ChannelNotFound` error.
    #[must_use]
    pub const fn channel_not_found(major: u32) -> Self {
        Self::ChannelNotFound { major }
    }

    /// Creates a new `NoMatchingRelease` error.
    #[must_use]
    pub fn no_matching_release(requested: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::NoMatchingRelease {
            requested: requested.into(),
            channel: channel.into(),
        }
    }

    /// Creates a new `VersionNotInChannel` error.
    #[must_use]
    pub fn version_not_in_channel(version: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::VersionNotInChannel {
            version: version.into(),
            channel: channel.into(),
        }
    }

    /// Creates a new `AssetNotFound` error.
    #[must_use]
    pub fn asset_not_found(version: impl Into<String>, platform: impl Into<String>) -> Self {
        Self::AssetNotFound {
            version: version.into(),
            platform: platform.into(),
        }
    }

    /// Creates a new `Extraction` error.
    #[must_use]
    pub fn extraction(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Filesystem` error.
    #[must_use]
    pub fn filesystem(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidArguments` error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Creates a new `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}

/// Returns the typed error carried by an `anyhow::Error`, if any.
///
/// Works through `.context(..)` layers.
#[must_use]
pub fn classify(err: &anyhow::Error) -> Option<&BootstrapError> {
    err.downcast_ref::<BootstrapError>()
}
