//! Toolchain acquisition for run-dotnet.
//!
//! Everything between a version request and a usable `.dotnet/dotnet`:
//! metadata retrieval, resolution, download, extraction and the project view.
//!
//! ## Module Structure
//!
//! - [`platform`] - Runtime identifier detection
//! - [`paths`] - Store and project directory layout
//! - [`request`] - Version request parsing
//! - [`pin`] - Persisted major-version pin
//! - [`fetch`] - HTTPS access with bounded redirect following
//! - [`cache`] - TTL cache for metadata documents
//! - [`catalog`] - Release index and channel document parsing
//! - [`resolver`] - Channel and version selection
//! - [`selector`] - Asset selection
//! - [`verify`] - SHA-512 checksum verification
//! - [`archive`] - tar.gz extraction
//! - [`store`] - Shared archive and installation cache
//! - [`view`] - Project-local symlink view

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod fetch;
pub mod paths;
pub mod pin;
pub mod platform;
pub mod request;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod verify;
pub mod view;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::{MetadataCache, Origin};
pub use fetch::Fetcher;
pub use paths::{ProjectPaths, StorePaths};
pub use pin::PinRecord;
pub use platform::Platform;
pub use request::VersionRequest;
pub use store::ArtifactStore;
