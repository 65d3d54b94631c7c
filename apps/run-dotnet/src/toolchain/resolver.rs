//! Version resolution.
//!
//! Turns a [`VersionRequest`] plus the current pin into a channel, and then
//! a channel document into one concrete release version. Both steps are pure;
//! the caller fetches the channel document in between and persists whatever
//! [`next_pin`] returns once the whole run has succeeded.
//!
//! ## Channel Selection
//!
//! 1. Explicit major in the request: the channel with that major, any phase
//! 2. No request, pin present: the channel with the pinned major, any phase
//! 3. No request, no pin: the active LTS channel with the highest major,
//!    else the first non-EOL STS channel in index order

use std::cmp::Ordering;

use anyhow::Result;

use super::catalog::{
    ChannelDescriptor, ChannelDocument, ReleaseIndex, ReleaseType, SupportPhase, leading_number,
};
use super::pin::PinRecord;
use super::request::VersionRequest;
use crate::errors::BootstrapError;

/// Picks the channel to consult for `request`.
///
/// # Errors
///
/// Returns `ChannelNotFound` when an explicit or pinned major has no channel,
/// and `NoChannelFound` when the default policy finds no candidate.
pub fn select_channel<'a>(
    request: &VersionRequest,
    pin: Option<PinRecord>,
    index: &'a ReleaseIndex,
) -> Result<&'a ChannelDescriptor> {
    if let Some(major) = request.major() {
        let preferred = match request {
            VersionRequest::MajorMinor(major, minor) => index
                .channels
                .iter()
                .find(|c| c.channel_version == format!("{major}.{minor}")),
            _ => None,
        };
        return preferred
            .or_else(|| by_major(index, major))
            .ok_or_else(|| BootstrapError::channel_not_found(major).into());
    }

    if let Some(pin) = pin {
        tracing::debug!(major = pin.major, "using pinned major version");
        return by_major(index, pin.major)
            .ok_or_else(|| BootstrapError::channel_not_found(pin.major).into());
    }

    default_channel(index).ok_or_else(|| BootstrapError::NoChannelFound.into())
}

fn by_major(index: &ReleaseIndex, major: u32) -> Option<&ChannelDescriptor> {
    index.channels.iter().find(|c| c.major == major)
}

fn default_channel(index: &ReleaseIndex) -> Option<&ChannelDescriptor> {
    let lts = index
        .channels
        .iter()
        .filter(|c| c.release_type == ReleaseType::Lts && c.support_phase == SupportPhase::Active)
        .max_by_key(|c| c.major);
    if lts.is_some() {
        return lts;
    }
    index
        .channels
        .iter()
        .find(|c| c.release_type == ReleaseType::Sts && c.support_phase != SupportPhase::Eol)
}

/// Picks the concrete release version within `channel`.
///
/// # Errors
///
/// Returns `NoMatchingRelease` when a `major.minor` request matches nothing.
pub fn resolve_version(
    request: &VersionRequest,
    channel: &ChannelDescriptor,
    document: &ChannelDocument,
) -> Result<String> {
    match request {
        VersionRequest::Unspecified | VersionRequest::Major(_) => {
            Ok(document.latest_release.clone())
        }
        VersionRequest::Exact { version, .. } => Ok(version.clone()),
        VersionRequest::MajorMinor(major, minor) => {
            let prefix = format!("{major}.{minor}.");
            document
                .releases
                .iter()
                .map(|r| r.release_version.as_str())
                .filter(|v| v.starts_with(&prefix))
                .max_by(|a, b| compare_versions(a, b))
                .map(ToString::to_string)
                .ok_or_else(|| {
                    BootstrapError::no_matching_release(
                        format!("{major}.{minor}"),
                        &channel.channel_version,
                    )
                    .into()
                })
        }
    }
}

/// Returns the pin to persist after a successful run, or `None` to leave it.
///
/// An explicit request always re-pins to its major. A first implicit run
/// pins the major of the version it resolved.
#[must_use]
pub fn next_pin(
    request: &VersionRequest,
    current: Option<PinRecord>,
    resolved_version: &str,
) -> Option<PinRecord> {
    match (request.major(), current) {
        (Some(major), _) => Some(PinRecord::new(major)),
        (None, Some(_)) => None,
        (None, None) => leading_number(resolved_version).map(PinRecord::new),
    }
}

/// Orders two release versions.
///
/// Semantic version ordering when both parse, otherwise component-wise
/// numeric ordering so `8.0.10` sorts after `8.0.9`.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => numeric_components(a).cmp(&numeric_components(b)),
    }
}

fn numeric_components(version: &str) -> Vec<u64> {
    version
        .split(['.', '-'])
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}
