//! Asset selection for a resolved release.

use anyhow::Result;

use super::catalog::{Asset, AssetKind, ChannelDocument, ReleaseDescriptor};
use super::paths::ARCHIVE_SUFFIX;
use super::platform::Platform;
use crate::errors::BootstrapError;

/// Picks the installable asset for `platform` from `release`.
///
/// SDK files win over runtime files. Within a list, `.tar.gz` archives are
/// preferred over other eligible files, then document order decides.
#[must_use]
pub fn select_asset<'a>(release: &'a ReleaseDescriptor, platform: Platform) -> Option<&'a Asset> {
    [&release.sdk_assets, &release.runtime_assets]
        .into_iter()
        .find_map(|assets| best_in(assets, platform.rid()))
}

fn best_in<'a>(assets: &'a [Asset], rid: &str) -> Option<&'a Asset> {
    let mut eligible = assets
        .iter()
        .filter(|a| a.platform_id == rid)
        .filter(|a| a.kind == AssetKind::Installer || is_tarball(a));
    let first = eligible.next()?;
    if is_tarball(first) {
        return Some(first);
    }
    Some(eligible.find(|a| is_tarball(a)).unwrap_or(first))
}

fn is_tarball(asset: &Asset) -> bool {
    asset.name.ends_with(ARCHIVE_SUFFIX) || asset.file_name().ends_with(ARCHIVE_SUFFIX)
}

/// Finds `version` in `document` and selects its asset for `platform`.
///
/// # Errors
///
/// Returns `VersionNotInChannel` if the channel does not list `version`, or
/// `AssetNotFound` if it does but offers nothing for `platform`.
pub fn select_for_version<'a>(
    document: &'a ChannelDocument,
    channel_version: &str,
    version: &str,
    platform: Platform,
) -> Result<&'a Asset> {
    let release = document
        .find_release(version)
        .ok_or_else(|| BootstrapError::version_not_in_channel(version, channel_version))?;
    select_asset(release, platform)
        .ok_or_else(|| BootstrapError::asset_not_found(version, platform.rid()).into())
}
