//! gvm: Go Version Manager
//!
//! Installs multiple Go toolchains side by side and switches a single
//! `goroot` symlink between them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Resolver   │────▶│  Installer  │────▶│ Activation  │
//! │ (specifier) │     │ (download)  │     │  (symlink)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │                   │
//!        ▼                   ▼                   ▼
//! ┌─────────────┐     ┌─────────────────────────────────┐
//! │Remote index │     │     Registry (registry.json)    │
//! │(go.dev, db) │     │                                 │
//! └─────────────┘     └─────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`version`]: `Version` ordering, specifiers, project pins and resolution
//! - [`index`]: Remote release index, SQLite cache and HTTP retry
//! - [`toolchain`]: Registry, installer, activation engine and filesystem layout
//! - [`commands`]: Command implementations used by the `gvm` binary
//! - [`config`]: Configuration file, constants and home directory lookup
//! - [`error`]: Error taxonomy and exit codes

pub mod commands;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod toolchain;
pub mod version;
