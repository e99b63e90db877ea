//! Version identifiers, specifiers and resolution
//!
//! ```text
//! "1.21" / "latest" / ".go-version"
//!          │
//!          ▼
//! ┌──────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ VersionSpecifier │────▶│  Resolver   │────▶│   Version   │
//! │     (parse)      │     │(index, reg.)│     │ (Resolution)│
//! └──────────────────┘     └─────────────┘     └─────────────┘
//!                                 │
//!                                 ▼
//!                          ┌─────────────┐
//!                          │  PinReader  │
//!                          │(.go-version,│
//!                          │   go.mod)   │
//!                          └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`semver`]: `Version` with Go tag parsing and a total order
//! - [`specifier`]: `VersionSpecifier` parsing and matching
//! - [`pin`]: Project pins from `.go-version` and `go.mod`
//! - [`resolver`]: Specifier to concrete version resolution

pub mod pin;
pub mod resolver;
pub mod semver;
pub mod specifier;

pub use self::semver::Version;
pub use self::specifier::VersionSpecifier;
