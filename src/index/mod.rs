//! Remote release index
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │ CachedIndex │────▶│ GoDevIndex  │──▶ download_source_json
//! │  (index.db) │     │(retry, HTTP)│
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`remote`]: `RemoteIndex` trait used by the resolver and installer
//! - [`go_dev`]: HTTP implementation for go.dev compatible listings
//! - [`cache`]: SQLite cache with stale fallback
//! - [`retry`]: Capped exponential backoff shared with archive downloads
//! - [`types`]: `Release` / `ReleaseFile` records
//! - [`error`]: Fetch and cache errors

pub mod cache;
pub mod error;
pub mod go_dev;
pub mod remote;
pub mod retry;
pub mod types;

pub use remote::RemoteIndex;
pub use types::{Release, ReleaseFile};
