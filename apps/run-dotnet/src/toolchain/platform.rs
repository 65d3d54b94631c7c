//! Platform detection for run-dotnet.
//!
//! Maps the build target onto the runtime identifier (RID) used by the .NET
//! release metadata to label downloadable files.
//!
//! ## Supported Platforms
//!
//! - Linux `x86_64` / ARM64, glibc and musl (`linux-x64`, `linux-arm64`,
//!   `linux-musl-x64`, `linux-musl-arm64`)
//! - macOS `x86_64` / ARM64 (`osx-x64`, `osx-arm64`)

use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

/// A platform with gzip-tarball SDK builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux on `x86_64`, glibc
    LinuxX64,
    /// Linux on ARM64, glibc
    LinuxArm64,
    /// Linux on `x86_64`, musl
    LinuxMuslX64,
    /// Linux on ARM64, musl
    LinuxMuslArm64,
    /// macOS on `x86_64`
    OsxX64,
    /// macOS on Apple Silicon
    OsxArm64,
}

impl Platform {
    /// All supported platforms.
    pub const ALL: [Self; 6] = [
        Self::LinuxX64,
        Self::LinuxArm64,
        Self::LinuxMuslX64,
        Self::LinuxMuslArm64,
        Self::OsxX64,
        Self::OsxArm64,
    ];

    /// Detects the current platform based on compile-time configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the current OS/architecture combination is not supported.
    pub fn detect() -> Result<Self> {
        #[cfg(all(target_os = "linux", target_arch = "x86_64", not(target_env = "musl")))]
        {
            return Ok(Self::LinuxX64);
        }

        #[cfg(all(target_os = "linux", target_arch = "aarch64", not(target_env = "musl")))]
        {
            return Ok(Self::LinuxArm64);
        }

        #[cfg(all(target_os = "linux", target_arch = "x86_64", target_env = "musl"))]
        {
            return Ok(Self::LinuxMuslX64);
        }

        #[cfg(all(target_os = "linux", target_arch = "aarch64", target_env = "musl"))]
        {
            return Ok(Self::LinuxMuslArm64);
        }

        #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
        {
            return Ok(Self::OsxX64);
        }

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            return Ok(Self::OsxArm64);
        }

        #[allow(unreachable_code)]
        {
            bail!(
                "Unsupported platform: {} on {}. Set RUN_DOTNET_RID to one of: {}",
                std::env::consts::OS,
                std::env::consts::ARCH,
                Self::ALL.map(Self::rid).join(", ")
            );
        }
    }

    /// Returns the runtime identifier used in release metadata.
    #[must_use = "returns the RID without side effects"]
    pub fn rid(self) -> &'static str {
        match self {
            Self::LinuxX64 => "linux-x64",
            Self::LinuxArm64 => "linux-arm64",
            Self::LinuxMuslX64 => "linux-musl-x64",
            Self::LinuxMuslArm64 => "linux-musl-arm64",
            Self::OsxX64 => "osx-x64",
            Self::OsxArm64 => "osx-arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rid())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.rid().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown runtime identifier '{s}'. Supported: {}",
                    Self::ALL.map(Self::rid).join(", ")
                )
            })
    }
}
