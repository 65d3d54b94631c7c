//! The bootstrap pipeline.
//!
//! ## Pipeline
//!
//! 1. **Load** - Read the project's pin, if any
//! 2. **Index** - Fetch (or reuse) the release index and pick a channel
//! 3. **Channel** - Fetch (or reuse) the channel document and pick a version
//! 4. **Select** - Pick the asset for the target platform
//! 5. **Acquire** - Download and extract into the shared store
//! 6. **View** - Point `<project>/.dotnet/` at the installation
//! 7. **Pin** - Persist the major version, only after everything above succeeded
//!
//! Each step awaits the previous one. A failure anywhere aborts the run and
//! leaves the pin untouched.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::toolchain::catalog::{parse_channel, parse_index};
use crate::toolchain::resolver::{next_pin, resolve_version, select_channel};
use crate::toolchain::selector::select_for_version;
use crate::toolchain::{
    ArtifactStore, Fetcher, MetadataCache, Origin, PinRecord, ProjectPaths, StorePaths,
    VersionRequest, view,
};

/// Result of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// Channel the version was resolved from, e.g. `"8.0"`.
    pub channel_version: String,
    /// Concrete release version, e.g. `"8.0.11"`.
    pub version: String,
    /// Installation directory inside the shared store.
    pub install_dir: PathBuf,
    /// `<project>/.dotnet/dotnet`.
    pub entry_point: PathBuf,
    /// Pin written by this run, if it changed.
    pub pinned: Option<PinRecord>,
}

/// Runs the pipeline for one project.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    config: Config,
    project: ProjectPaths,
    fetcher: Fetcher,
    cache: MetadataCache,
    store: ArtifactStore,
}

impl Bootstrapper {
    /// Creates a bootstrapper for the project rooted at `project_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config, project_root: PathBuf) -> Result<Self> {
        let fetcher = Fetcher::from_config(config)?;
        let store = ArtifactStore::new(
            StorePaths::with_root(config.store_root.clone()),
            fetcher.clone(),
        );
        Ok(Self {
            cache: MetadataCache::new(store.paths().cache.clone(), config.metadata_ttl),
            store,
            project: ProjectPaths::with_root(project_root),
            config: config.clone(),
            fetcher,
        })
    }

    /// Returns the project layout.
    #[must_use]
    pub fn project(&self) -> &ProjectPaths {
        &self.project
    }

    /// Resolves, installs and links the toolchain for `request`.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; see [`crate::errors::BootstrapError`].
    pub async fn run(&self, request: &VersionRequest) -> Result<Installation> {
        let pin = PinRecord::load(&self.project.pin_file())?;
        tracing::debug!(%request, pin = ?pin.map(|p| p.major), "resolving");

        let index_url = &self.config.index_url;
        let index_text = self
            .cache
            .fetch_text(&self.fetcher, index_url)
            .await
            .context("Failed to fetch release index")?;
        let index = parse_index(&index_text, index_url.as_str())?;
        tracing::debug!(channels = index.channels.len(), "release index loaded");

        let channel = select_channel(request, pin, &index)?;
        tracing::info!(
            channel = %channel.channel_version,
            reason = selection_reason(request, pin),
            "selected channel"
        );

        let (channel_text, origin) = self
            .cache
            .fetch_tracked(&self.fetcher, &channel.releases_url)
            .await
            .with_context(|| format!("Failed to fetch channel {}", channel.channel_version))?;
        let mut document = parse_channel(&channel_text, channel.releases_url.as_str())?;

        let version = resolve_version(request, channel, &document)?;
        tracing::info!(%version, "resolved version");

        // A cached document predates any release published since it was stored.
        if origin == Origin::Cache
            && matches!(request, VersionRequest::Exact { .. })
            && document.find_release(&version).is_none()
        {
            tracing::info!(
                %version,
                channel = %channel.channel_version,
                "release not in cached channel, refetching"
            );
            let fresh = self
                .cache
                .refresh(&self.fetcher, &channel.releases_url)
                .await
                .with_context(|| format!("Failed to fetch channel {}", channel.channel_version))?;
            document = parse_channel(&fresh, channel.releases_url.as_str())?;
        }

        let asset = select_for_version(
            &document,
            &channel.channel_version,
            &version,
            self.config.platform,
        )?;
        tracing::debug!(asset = %asset.name, url = %asset.url, "selected asset");

        let archive = self
            .store
            .ensure_downloaded(asset)
            .await
            .with_context(|| format!("Failed to download .NET {version}"))?;
        let install_dir = self
            .store
            .ensure_extracted(&archive, &version)
            .await
            .with_context(|| format!("Failed to install .NET {version}"))?;

        view::refresh(&install_dir, &self.project.view)?;
        tracing::info!(view = %self.project.view.display(), "toolchain ready");

        let pinned = next_pin(request, pin, &version);
        if let Some(new_pin) = pinned {
            new_pin.save(&self.project.pin_file())?;
            tracing::info!(major = new_pin.major, "pinned major version");
        }

        Ok(Installation {
            channel_version: channel.channel_version.clone(),
            version,
            install_dir,
            entry_point: self.project.entry_point(),
            pinned,
        })
    }
}

fn selection_reason(request: &VersionRequest, pin: Option<PinRecord>) -> &'static str {
    match (request, pin) {
        (VersionRequest::Unspecified, Some(_)) => "pinned",
        (VersionRequest::Unspecified, None) => "default policy",
        _ => "requested",
    }
}
