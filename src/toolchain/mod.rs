//! Local toolchain management
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │  Installer  │────▶│  Registry   │◀────│ ActivationEngine │
//! │ (download,  │     │(registry.   │     │ (goroot symlink) │
//! │  extract)   │     │  json+lock) │     └──────────────────┘
//! └─────────────┘     └─────────────┘
//!        │                   ▲
//!        ▼                   │
//! ┌─────────────┐     ┌─────────────┐
//! │  archive,   │     │    link     │
//! │   verify    │     │(system SDKs)│
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`registry`]: Installed toolchains and the active pointer
//! - [`installer`]: Install and uninstall with staging directories
//! - [`activation`]: Atomic switch of the `goroot` symlink
//! - [`link`]: External SDK discovery and registration
//! - [`download`], [`verify`], [`archive`]: Fetching and unpacking SDK archives
//! - [`lock`]: Cross-process registry lock
//! - [`paths`]: Layout of the gvm home directory
//! - [`platform`]: Go os/arch naming for the running host
//! - [`shell`]: Env script and rc file hook written by `gvm init`

pub mod activation;
pub mod archive;
pub mod download;
pub mod installer;
pub mod link;
pub mod lock;
pub mod paths;
pub mod platform;
pub mod registry;
pub mod shell;
pub mod verify;

pub use activation::ActivationEngine;
pub use installer::{InstallOptions, Installer};
pub use paths::GvmPaths;
pub use platform::Platform;
pub use registry::{InstalledToolchain, Origin, Registry};
