//! Version request parsing.
//!
//! The first command-line argument selects a version when it starts with a
//! digit; everything else is forwarded to `dotnet` untouched.
//!
//! ```text
//! run-dotnet build            -> Unspecified, ["build"]
//! run-dotnet 8 build          -> Major(8), ["build"]
//! run-dotnet 8.0 build        -> MajorMinor(8, 0), ["build"]
//! run-dotnet 8.0.404 build    -> Exact("8.0.404"), ["build"]
//! ```

use anyhow::Result;
use std::fmt;

use crate::errors::BootstrapError;

/// A user-supplied version selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    /// No version given; use the pin or the default channel policy.
    Unspecified,
    /// A major version (`8`).
    Major(u32),
    /// A major and minor version (`8.0`).
    MajorMinor(u32, u32),
    /// A full version (`8.0.404`, `9.0.0-rc.2.24473.5`).
    Exact {
        /// The leading component.
        major: u32,
        /// The full version string.
        version: String,
    },
}

impl VersionRequest {
    /// Parses a version token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if the token is not `M`, `M.m`, or a full
    /// semantic version.
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || {
            BootstrapError::invalid_arguments(format!(
                "'{token}' is not a version (expected MAJOR, MAJOR.MINOR, or MAJOR.MINOR.PATCH)"
            ))
        };

        let parts: Vec<&str> = token.splitn(3, '.').collect();
        match parts.as_slice() {
            [major] => Ok(Self::Major(major.parse().map_err(|_| invalid())?)),
            [major, minor] => Ok(Self::MajorMinor(
                major.parse().map_err(|_| invalid())?,
                minor.parse().map_err(|_| invalid())?,
            )),
            [major, _, _] => {
                semver::Version::parse(token).map_err(|_| invalid())?;
                Ok(Self::Exact {
                    major: major.parse().map_err(|_| invalid())?,
                    version: token.to_string(),
                })
            }
            _ => Err(invalid().into()),
        }
    }

    /// Splits raw arguments into a version request and the arguments to forward.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` if the leading token looks numeric but is
    /// not a valid version.
    pub fn split_args(mut args: Vec<String>) -> Result<(Self, Vec<String>)> {
        let looks_numeric = args
            .first()
            .is_some_and(|a| a.starts_with(|c: char| c.is_ascii_digit()));
        if !looks_numeric {
            return Ok((Self::Unspecified, args));
        }
        let token = args.remove(0);
        Ok((Self::parse(&token)?, args))
    }

    /// Returns the requested major version, if any.
    #[must_use]
    pub fn major(&self) -> Option<u32> {
        match self {
            Self::Unspecified => None,
            Self::Major(major) | Self::MajorMinor(major, _) | Self::Exact { major, .. } => {
                Some(*major)
            }
        }
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "(unspecified)"),
            Self::Major(major) => write!(f, "{major}"),
            Self::MajorMinor(major, minor) => write!(f, "{major}.{minor}"),
            Self::Exact { version, .. } => write!(f, "{version}"),
        }
    }
}
