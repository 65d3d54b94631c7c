//! Environment-driven configuration for run-dotnet.
//!
//! Every setting is read once at startup into a [`Config`] value that is
//! then passed down explicitly.
//!
//! ## Environment Variables
//!
//! - `RUN_DOTNET_HOME`: shared store root (default: `~/.local/share/run-dotnet`)
//! - `RUN_DOTNET_INDEX_URL`: release index URL
//! - `RUN_DOTNET_RID`: runtime identifier override (default: detected)
//! - `RUN_DOTNET_TIMEOUT_SECS`: connect and read timeout, and the total cap
//!   for metadata requests (default: 300)
//! - `RUN_DOTNET_METADATA_TTL_SECS`: metadata cache TTL, `0` disables (default: 900)
//! - `RUN_DOTNET_ALLOW_HTTP`: accept plain `http://` URLs
//! - `RUN_DOTNET_SKIP_RESTORE`: skip the automatic `dotnet restore`
//! - `RUN_DOTNET_LOG`: `json` for JSON log lines
//!
//! Empty or whitespace-only values are treated as unset.

use anyhow::{Context, Result};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::BootstrapError;
use crate::telemetry::LogFormat;
use crate::toolchain::Platform;

/// Environment variable to override the shared store root.
pub const HOME_ENV: &str = "RUN_DOTNET_HOME";
/// Environment variable to override the release index URL.
pub const INDEX_URL_ENV: &str = "RUN_DOTNET_INDEX_URL";
/// Environment variable to override the runtime identifier.
pub const RID_ENV: &str = "RUN_DOTNET_RID";
/// Environment variable for the per-request timeout in seconds.
pub const TIMEOUT_ENV: &str = "RUN_DOTNET_TIMEOUT_SECS";
/// Environment variable for the metadata cache TTL in seconds.
pub const METADATA_TTL_ENV: &str = "RUN_DOTNET_METADATA_TTL_SECS";
/// Environment variable permitting plain HTTP.
pub const ALLOW_HTTP_ENV: &str = "RUN_DOTNET_ALLOW_HTTP";
/// Environment variable disabling the restore step.
pub const SKIP_RESTORE_ENV: &str = "RUN_DOTNET_SKIP_RESTORE";
/// Environment variable selecting the log format.
pub const LOG_ENV: &str = "RUN_DOTNET_LOG";

/// Default release index location.
pub const DEFAULT_INDEX_URL: &str =
    "https://dotnetcli.blob.core.windows.net/dotnet/release-metadata/releases-index.json";

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_METADATA_TTL_SECS: u64 = 900;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Release index URL.
    pub index_url: Url,
    /// Root of the shared, user-scoped artifact store.
    pub store_root: PathBuf,
    /// Target platform.
    pub platform: Platform,
    /// Connect and read timeout; also the total cap on metadata requests.
    pub request_timeout: Duration,
    /// How long cached metadata documents stay fresh.
    pub metadata_ttl: Duration,
    /// Whether plain `http://` URLs are accepted.
    pub allow_http: bool,
    /// Whether to skip `dotnet restore` before the user command.
    pub skip_restore: bool,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value or the home
    /// directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        let index_url = env_var(INDEX_URL_ENV).unwrap_or_else(|| DEFAULT_INDEX_URL.to_string());
        let index_url = Url::parse(&index_url)
            .with_context(|| format!("{INDEX_URL_ENV} is not a valid URL: {index_url}"))?;

        let platform = match env_var(RID_ENV) {
            Some(rid) => rid
                .parse()
                .map_err(|e: anyhow::Error| BootstrapError::invalid_arguments(e.to_string()))?,
            None => Platform::detect()?,
        };

        Ok(Self {
            index_url,
            store_root: store_root()?,
            platform,
            request_timeout: Duration::from_secs(env_secs(TIMEOUT_ENV, DEFAULT_TIMEOUT_SECS)?),
            metadata_ttl: Duration::from_secs(env_secs(
                METADATA_TTL_ENV,
                DEFAULT_METADATA_TTL_SECS,
            )?),
            allow_http: env_flag(ALLOW_HTTP_ENV),
            skip_restore: env_flag(SKIP_RESTORE_ENV),
            log_format: match env_var(LOG_ENV) {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }
}

/// Returns the store root: `RUN_DOTNET_HOME`, else `~/.local/share/run-dotnet`.
fn store_root() -> Result<PathBuf> {
    if let Some(home) = env_var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    Ok(dirs::home_dir()
        .context("Cannot determine home directory. Set RUN_DOTNET_HOME environment variable.")?
        .join(".local")
        .join("share")
        .join("run-dotnet"))
}

/// Reads a variable, treating empty or whitespace-only values as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    env_var(name).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn env_secs(name: &str, default: u64) -> Result<u64> {
    match env_var(name) {
        Some(v) => v
            .parse()
            .with_context(|| format!("{name} must be a whole number of seconds, got '{v}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 8] = [
        HOME_ENV,
        INDEX_URL_ENV,
        RID_ENV,
        TIMEOUT_ENV,
        METADATA_TTL_ENV,
        ALLOW_HTTP_ENV,
        SKIP_RESTORE_ENV,
        LOG_ENV,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            // SAFETY: env tests are serialized with `serial_test`.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial_test::serial]
    fn defaults_when_env_not_set() {
        clear_env();
        let config = Config::from_env().expect("Should build config");
        assert_eq!(config.index_url.as_str(), DEFAULT_INDEX_URL);
        assert!(config.store_root.ends_with(".local/share/run-dotnet"));
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.metadata_ttl, Duration::from_secs(900));
        assert!(!config.allow_http);
        assert!(!config.skip_restore);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    #[serial_test::serial]
    fn env_overrides_are_applied() {
        clear_env();
        unsafe {
            std::env::set_var(HOME_ENV, "/tmp/rdn-store");
            std::env::set_var(INDEX_URL_ENV, "  http://localhost:8080/index.json  ");
            std::env::set_var(RID_ENV, "osx-arm64");
            std::env::set_var(TIMEOUT_ENV, "5");
            std::env::set_var(METADATA_TTL_ENV, "0");
            std::env::set_var(ALLOW_HTTP_ENV, "true");
            std::env::set_var(SKIP_RESTORE_ENV, "1");
            std::env::set_var(LOG_ENV, "JSON");
        }
        let config = Config::from_env().expect("Should build config");
        clear_env();

        assert_eq!(config.store_root, PathBuf::from("/tmp/rdn-store"));
        assert_eq!(config.index_url.as_str(), "http://localhost:8080/index.json");
        assert_eq!(config.platform, Platform::OsxArm64);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.metadata_ttl, Duration::ZERO);
        assert!(config.allow_http);
        assert!(config.skip_restore);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    #[serial_test::serial]
    fn whitespace_only_values_are_unset() {
        clear_env();
        unsafe {
            std::env::set_var(HOME_ENV, "   ");
            std::env::set_var(ALLOW_HTTP_ENV, "");
        }
        let config = Config::from_env().expect("Should build config");
        clear_env();

        assert!(config.store_root.ends_with("run-dotnet"));
        assert!(!config.allow_http);
    }

    #[test]
    #[serial_test::serial]
    fn unknown_rid_is_invalid_arguments() {
        clear_env();
        unsafe { std::env::set_var(RID_ENV, "plan9-mips") };
        let err = Config::from_env().unwrap_err();
        clear_env();

        assert!(matches!(
            crate::errors::classify(&err),
            Some(BootstrapError::InvalidArguments { .. })
        ));
    }

    #[test]
    #[serial_test::serial]
    fn bad_timeout_is_rejected() {
        clear_env();
        unsafe { std::env::set_var(TIMEOUT_ENV, "soon") };
        let err = Config::from_env().unwrap_err();
        clear_env();

        assert!(err.to_string().contains(TIMEOUT_ENV));
    }
}
