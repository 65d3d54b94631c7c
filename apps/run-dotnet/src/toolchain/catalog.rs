//! Release metadata parsing.
//!
//! Two documents are involved: the release index listing every channel,
//! and a per-channel document listing its patch releases and their files.
//!
//! ## Index Format
//!
//! ```json
//! { "releases-index": [
//!     { "channel-version": "8.0", "release-type": "lts", "support-phase": "active",
//!       "releases.json": "https://.../8.0/releases.json" } ] }
//! ```
//!
//! ## Channel Format
//!
//! ```json
//! { "latest-release": "8.0.11",
//!   "releases": [
//!     { "release-version": "8.0.11",
//!       "sdk":     { "files": [ { "rid": "linux-x64", "name": "...", "url": "...",
//!                                 "file-type": "tar.gz", "hash": "..." } ] },
//!       "runtime": { "files": [ ... ] } } ] }
//! ```
//!
//! Both parsers fail only when the top-level structure is missing. Individual
//! entries that lack required fields are skipped, because the index grows
//! over time and old entries are not always well formed.

use anyhow::Result;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::BootstrapError;

/// Support classification of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseType {
    /// Long-term support.
    Lts,
    /// Standard-term support.
    Sts,
    /// Anything else the index reports.
    Other(String),
}

impl From<&str> for ReleaseType {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "lts" => Self::Lts,
            "sts" => Self::Sts,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Lifecycle phase of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportPhase {
    /// Fully supported.
    Active,
    /// Security fixes only.
    Maintenance,
    /// Pre-release.
    Preview,
    /// Release candidate with a go-live license.
    GoLive,
    /// End of life.
    Eol,
    /// Anything else the index reports.
    Other(String),
}

impl From<&str> for SupportPhase {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "maintenance" => Self::Maintenance,
            "preview" => Self::Preview,
            "go-live" => Self::GoLive,
            "eol" => Self::Eol,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One release line from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Channel version, e.g. `"8.0"`.
    pub channel_version: String,
    /// Leading numeric component of `channel_version`.
    pub major: u32,
    /// Support classification.
    pub release_type: ReleaseType,
    /// Lifecycle phase.
    pub support_phase: SupportPhase,
    /// Location of the channel document.
    pub releases_url: Url,
}

/// All channels from the release index, in document order, unique by version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseIndex {
    /// Channel descriptors.
    pub channels: Vec<ChannelDescriptor>,
}

/// Kind of downloadable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Platform installer package (`.pkg`, `.exe`, `.msi`).
    Installer,
    /// Archive (`.tar.gz`, `.zip`).
    Archive,
    /// Checksums, symbols and everything else.
    Other,
}

impl AssetKind {
    fn classify(file_type: Option<&str>, name: &str) -> Self {
        let from_suffix = |s: &str| {
            let s = s.to_ascii_lowercase();
            if s.ends_with("tar.gz") || s.ends_with("tgz") || s.ends_with("zip") {
                Self::Archive
            } else if s.ends_with("pkg") || s.ends_with("exe") || s.ends_with("msi") {
                Self::Installer
            } else {
                Self::Other
            }
        };
        match file_type.map(from_suffix) {
            Some(kind) if kind != Self::Other => kind,
            _ => from_suffix(name),
        }
    }
}

/// A downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Runtime identifier, e.g. `"linux-x64"`.
    pub platform_id: String,
    /// File kind.
    pub kind: AssetKind,
    /// Display name, e.g. `"dotnet-sdk-linux-x64.tar.gz"`.
    pub name: String,
    /// Download location.
    pub url: Url,
    /// Published SHA-512 digest (hex), when the document carries one.
    pub hash: Option<String>,
}

impl Asset {
    /// Returns the last path segment of the download URL.
    ///
    /// Example: `".../Sdk/8.0.404/dotnet-sdk-8.0.404-linux-x64.tar.gz"` ->
    /// `"dotnet-sdk-8.0.404-linux-x64.tar.gz"`
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

/// One patch release within a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Release version, e.g. `"8.0.11"`.
    pub release_version: String,
    /// SDK files.
    pub sdk_assets: Vec<Asset>,
    /// Runtime files.
    pub runtime_assets: Vec<Asset>,
}

/// A parsed channel document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDocument {
    /// The newest release in the channel.
    pub latest_release: String,
    /// All releases, in document order.
    pub releases: Vec<ReleaseDescriptor>,
}

impl ChannelDocument {
    /// Finds the release with exactly `version`.
    #[must_use]
    pub fn find_release(&self, version: &str) -> Option<&ReleaseDescriptor> {
        self.releases.iter().find(|r| r.release_version == version)
    }
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(rename = "releases-index")]
    releases_index: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawChannel {
    channel_version: Option<String>,
    release_type: Option<String>,
    support_phase: Option<String>,
    #[serde(rename = "releases.json")]
    releases_json: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawChannelDoc {
    latest_release: Option<String>,
    releases: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawRelease {
    release_version: Option<String>,
    sdk: Option<RawComponent>,
    runtime: Option<RawComponent>,
}

#[derive(Deserialize)]
struct RawComponent {
    #[serde(default)]
    files: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawFile {
    rid: Option<String>,
    url: Option<String>,
    name: Option<String>,
    file_type: Option<String>,
    hash: Option<String>,
}

/// Parses the release index.
///
/// `source` names the document in error messages.
///
/// # Errors
///
/// Returns `MalformedMetadata` if the text is not JSON or lacks the
/// `releases-index` array.
pub fn parse_index(json: &str, source: &str) -> Result<ReleaseIndex> {
    let raw: RawIndex = serde_json::from_str(json)
        .map_err(|e| BootstrapError::malformed_metadata(source, e.to_string()))?;
    let entries = raw.releases_index.ok_or_else(|| {
        BootstrapError::malformed_metadata(source, "missing \"releases-index\" array")
    })?;

    let mut index = ReleaseIndex::default();
    for entry in entries {
        let Some(channel) = channel_from_value(entry) else {
            continue;
        };
        if index
            .channels
            .iter()
            .any(|c| c.channel_version == channel.channel_version)
        {
            tracing::debug!(channel = %channel.channel_version, "skipping duplicate channel");
            continue;
        }
        index.channels.push(channel);
    }
    Ok(index)
}

fn channel_from_value(value: Value) -> Option<ChannelDescriptor> {
    let raw: RawChannel = serde_json::from_value(value).ok()?;
    let channel_version = raw.channel_version?;
    let Some(releases_url) = raw.releases_json.and_then(|u| Url::parse(&u).ok()) else {
        tracing::debug!(channel = %channel_version, "channel has no usable releases.json URL");
        return None;
    };
    let major = leading_number(&channel_version)?;
    Some(ChannelDescriptor {
        major,
        release_type: raw.release_type.as_deref().unwrap_or_default().into(),
        support_phase: raw.support_phase.as_deref().unwrap_or_default().into(),
        releases_url,
        channel_version,
    })
}

/// Parses a channel document.
///
/// # Errors
///
/// Returns `MalformedMetadata` if the text is not JSON or lacks
/// `latest-release` or `releases`.
pub fn parse_channel(json: &str, source: &str) -> Result<ChannelDocument> {
    let raw: RawChannelDoc = serde_json::from_str(json)
        .map_err(|e| BootstrapError::malformed_metadata(source, e.to_string()))?;
    let latest_release = raw.latest_release.ok_or_else(|| {
        BootstrapError::malformed_metadata(source, "missing \"latest-release\"")
    })?;
    if !is_release_version(&latest_release) {
        return Err(BootstrapError::malformed_metadata(
            source,
            format!("\"latest-release\" '{latest_release}' is not a release version"),
        )
        .into());
    }
    let releases = raw
        .releases
        .ok_or_else(|| BootstrapError::malformed_metadata(source, "missing \"releases\" array"))?;

    Ok(ChannelDocument {
        latest_release,
        releases: releases.into_iter().filter_map(release_from_value).collect(),
    })
}

fn release_from_value(value: Value) -> Option<ReleaseDescriptor> {
    let raw: RawRelease = serde_json::from_value(value).ok()?;
    let assets = |component: Option<RawComponent>| -> Vec<Asset> {
        component
            .map(|c| c.files.into_iter().filter_map(asset_from_value).collect())
            .unwrap_or_default()
    };
    let release_version = raw.release_version?;
    if !is_release_version(&release_version) {
        tracing::debug!(release = %release_version, "skipping release with invalid version");
        return None;
    }
    Some(ReleaseDescriptor {
        release_version,
        sdk_assets: assets(raw.sdk),
        runtime_assets: assets(raw.runtime),
    })
}

fn asset_from_value(value: Value) -> Option<Asset> {
    let raw: RawFile = serde_json::from_value(value).ok()?;
    let url = Url::parse(raw.url.as_deref()?).ok()?;
    let name = raw.name?;
    Some(Asset {
        platform_id: raw.rid?,
        kind: AssetKind::classify(raw.file_type.as_deref(), &name),
        name,
        url,
        hash: raw.hash.filter(|h| !h.trim().is_empty()),
    })
}

/// Returns whether `version` can name a release and its store directory.
///
/// Accepts semantic versions, and otherwise dot-separated alphanumeric parts
/// with a numeric leading part (`8.0.11`, `8.0.100-preview.1`).
#[must_use]
pub fn is_release_version(version: &str) -> bool {
    if semver::Version::parse(version).is_ok() {
        return true;
    }
    leading_number(version).is_some()
        && version.split('.').all(|part| !part.is_empty())
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
}

/// Parses the leading dot-delimited component as an integer.
///
/// `"10.0"` -> `10`, `"9"` -> `9`, `"x.1"` -> `None`.
#[must_use]
pub fn leading_number(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}
