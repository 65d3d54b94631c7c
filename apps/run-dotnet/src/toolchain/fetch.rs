//! HTTP access for release metadata and artifacts.
//!
//! Redirects are followed by hand rather than by the HTTP client so every
//! hop is re-validated: only absolute `https://` targets are accepted and
//! the chain is cut off after [`MAX_REDIRECTS`] hops.
//!
//! ## Features
//!
//! - One client per run, with a fixed user agent
//! - Metadata requests are capped as a whole; downloads are bounded by
//!   connect and read timeouts only, so a slow but live transfer completes
//! - Streaming downloads straight to the destination path
//! - Gzip magic check on every completed download
//!
//! Nothing here retries. A failed request aborts the run.

use std::error::Error as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{StatusCode, Url};
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::errors::BootstrapError;

/// Maximum number of redirect hops followed for one request.
pub const MAX_REDIRECTS: u8 = 5;

/// User agent sent with every request.
pub const USER_AGENT: &str = "run-dotnet-bootstrapper";

/// First two bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Position within a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RedirectState {
    url: Url,
    hops: u8,
}

impl RedirectState {
    fn start(url: &Url) -> Self {
        Self {
            url: url.clone(),
            hops: 0,
        }
    }

    /// Moves to `next`, failing once the hop bound is exceeded.
    fn follow(self, next: Url) -> Result<Self, BootstrapError> {
        if self.hops >= MAX_REDIRECTS {
            return Err(BootstrapError::protocol(
                self.url.as_str(),
                format!("more than {MAX_REDIRECTS} redirects"),
            ));
        }
        Ok(Self {
            url: next,
            hops: self.hops + 1,
        })
    }
}

/// HTTP client for metadata documents and artifact downloads.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    allow_http: bool,
}

impl Fetcher {
    /// Creates a fetcher.
    ///
    /// `timeout` bounds connecting and each read. Metadata fetches are also
    /// capped at `timeout` from connect to the last body byte; downloads are
    /// not. `allow_http` additionally accepts plain `http://` URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, allow_http: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            timeout,
            allow_http,
        })
    }

    /// Creates a fetcher from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.request_timeout, config.allow_http)
    }

    /// Fetches `url` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns `Network` on connection failure, `Protocol` on a non-200
    /// final status or a rejected redirect.
    pub async fn fetch_text(&self, url: &Url) -> Result<String> {
        let (final_url, response) = self
            .send_following_redirects(url, Some(self.timeout))
            .await?;
        let body = response
            .text()
            .await
            .map_err(|e| BootstrapError::network(final_url.as_str(), describe(&e)))?;
        tracing::debug!(url = %final_url, bytes = body.len(), "fetched document");
        Ok(body)
    }

    /// Streams `url` into `dest` and checks the result is a gzip stream.
    ///
    /// Returns the number of bytes written. On an integrity failure the
    /// partial file is left in place for the caller to discard.
    ///
    /// # Errors
    ///
    /// Returns `Network`, `Protocol`, `Integrity`, or a write failure.
    pub async fn fetch_to_file(&self, url: &Url, dest: &Path) -> Result<u64> {
        let (final_url, response) = self.send_following_redirects(url, None).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| BootstrapError::filesystem(dest, e.to_string()))?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let mut head = Vec::with_capacity(GZIP_MAGIC.len());

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| BootstrapError::network(final_url.as_str(), describe(&e)))?;
            if head.len() < GZIP_MAGIC.len() {
                let take = (GZIP_MAGIC.len() - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write to {}", dest.display()))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", dest.display()))?;

        if head != GZIP_MAGIC {
            return Err(BootstrapError::integrity(dest).into());
        }

        tracing::debug!(url = %final_url, bytes = written, path = %dest.display(), "downloaded");
        Ok(written)
    }

    /// Issues GETs along the redirect chain until a 200 response arrives.
    ///
    /// `total` caps each request including its body.
    async fn send_following_redirects(
        &self,
        url: &Url,
        total: Option<Duration>,
    ) -> Result<(Url, reqwest::Response)> {
        self.check_scheme(url)?;
        let mut state = RedirectState::start(url);

        loop {
            let mut request = self.client.get(state.url.clone());
            if let Some(total) = total {
                request = request.timeout(total);
            }
            let response = request
                .send()
                .await
                .map_err(|e| BootstrapError::network(state.url.as_str(), describe(&e)))?;
            let status = response.status();

            if is_followed_redirect(status) {
                let next = self.redirect_target(&state.url, &response)?;
                tracing::debug!(from = %state.url, to = %next, %status, "following redirect");
                state = state.follow(next)?;
                continue;
            }

            if status != StatusCode::OK {
                return Err(BootstrapError::protocol(
                    state.url.as_str(),
                    format!("unexpected HTTP status {status}"),
                )
                .into());
            }
            return Ok((state.url, response));
        }
    }

    fn redirect_target(&self, from: &Url, response: &reqwest::Response) -> Result<Url> {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                BootstrapError::protocol(from.as_str(), "redirect without a Location header")
            })?;
        let next = Url::parse(location).map_err(|_| {
            BootstrapError::protocol(
                from.as_str(),
                format!("redirect target '{location}' is not an absolute URL"),
            )
        })?;
        self.check_scheme(&next)?;
        Ok(next)
    }

    fn check_scheme(&self, url: &Url) -> Result<(), BootstrapError> {
        match url.scheme() {
            "https" => Ok(()),
            "http" if self.allow_http => Ok(()),
            other => Err(BootstrapError::protocol(
                url.as_str(),
                format!("unsupported URL scheme '{other}'"),
            )),
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Renders a reqwest error with its source chain.
fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "request timed out".to_string();
    }
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
