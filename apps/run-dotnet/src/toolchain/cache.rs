//! On-disk cache for release metadata documents.
//!
//! Each document is stored as a JSON envelope holding the source URL, the
//! fetch time and the raw body. A cached document younger than the TTL is
//! served without touching the network, which is what lets a warm second
//! run complete offline.
//!
//! The cache is best-effort: unreadable or stale entries count as misses,
//! and write failures are logged and otherwise ignored.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::io::Write;

use super::fetch::Fetcher;

/// A cached metadata document.
#[derive(Debug, Serialize, Deserialize)]
struct CachedDocument {
    url: String,
    timestamp: u64,
    body: String,
}

/// Where a document body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A fresh cache entry.
    Cache,
    /// The network, just now.
    Network,
}

/// TTL cache in front of a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct MetadataCache {
    dir: PathBuf,
    ttl: Duration,
}

impl MetadataCache {
    /// Creates a cache rooted at `dir`. A zero `ttl` disables caching.
    #[must_use]
    pub fn new(dir: PathBuf, ttl: Duration) -> Self {
        Self { dir, ttl }
    }

    /// Returns the body of `url`, from cache when fresh, else from the network.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error on a cache miss.
    pub async fn fetch_text(&self, fetcher: &Fetcher, url: &Url) -> Result<String> {
        let (body, _) = self.fetch_tracked(fetcher, url).await?;
        Ok(body)
    }

    /// Like [`Self::fetch_text`], also reporting where the body came from.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error on a cache miss.
    pub async fn fetch_tracked(&self, fetcher: &Fetcher, url: &Url) -> Result<(String, Origin)> {
        if let Some(body) = self.load_fresh(url) {
            tracing::debug!(%url, "metadata cache hit");
            return Ok((body, Origin::Cache));
        }
        Ok((self.refresh(fetcher, url).await?, Origin::Network))
    }

    /// Fetches `url` from the network regardless of the cache and stores the result.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error.
    pub async fn refresh(&self, fetcher: &Fetcher, url: &Url) -> Result<String> {
        let body = fetcher.fetch_text(url).await?;
        self.save(url, &body);
        Ok(body)
    }

    /// Returns the cached body of `url` if it is younger than the TTL.
    #[must_use]
    pub fn load_fresh(&self, url: &Url) -> Option<String> {
        if self.ttl.is_zero() {
            return None;
        }
        let path = self.path_for(url);
        let content = std::fs::read_to_string(&path).ok()?;

        let Ok(cached) = serde_json::from_str::<CachedDocument>(&content) else {
            let _ = std::fs::remove_file(&path);
            return None;
        };
        if cached.url != url.as_str() {
            return None;
        }
        let age = current_timestamp().saturating_sub(cached.timestamp);
        (age < self.ttl.as_secs()).then_some(cached.body)
    }

    /// Writes `body` for `url`. Failures are logged and swallowed.
    pub fn save(&self, url: &Url, body: &str) {
        if self.ttl.is_zero() {
            return;
        }
        if let Err(e) = self.try_save(url, body) {
            tracing::debug!(%url, error = %e, "failed to cache metadata");
        }
    }

    fn try_save(&self, url: &Url, body: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let cached = CachedDocument {
            url: url.to_string(),
            timestamp: current_timestamp(),
            body: body.to_string(),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".cache-")
            .tempfile_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, &cached)?;
        tmp.flush()?;
        tmp.persist(self.path_for(url))?;
        Ok(())
    }

    fn path_for(&self, url: &Url) -> PathBuf {
        self.dir.join(cache_file_name(url))
    }
}

/// Derives a file name from the host and path of `url`.
///
/// `https://host.example/dotnet/8.0/releases.json` ->
/// `host.example_dotnet_8.0_releases.json.json`
fn cache_file_name(url: &Url) -> String {
    let raw = format!("{}{}", url.host_str().unwrap_or("local"), url.path());
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if let Some(port) = url.port() {
        name = format!("{port}_{name}");
    }
    name.push_str(".json");
    name
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
