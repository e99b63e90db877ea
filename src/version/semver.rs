//! `Version`: a Go release version with a total order
//!
//! Go release tags (`go1.21.3`, `go1.20`, `go1.22rc1`, `go1.9beta2`) and
//! semver strings (`1.22.0-rc.1+build`) both parse into the same type.
//! Versions are stored and displayed in semver form; [`Version::go_tag`]
//! renders the tag form used by the upstream release index.
//!
//! Ordering follows semver precedence (pre-releases sort before the release)
//! with build metadata compared lexically as the final tie-break, so two
//! versions compare equal only when they are identical.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GvmError;

static GO_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:(alpha|beta|rc)(\d+))?$").expect("valid regex")
});

static GO_PRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(alpha|beta|rc)\.(\d+)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(semver::Version);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parses a Go release tag or a semver string.
    ///
    /// A leading `go` or `v` is ignored. A missing patch component is `0`.
    pub fn parse(input: &str) -> Result<Self, GvmError> {
        let trimmed = input.trim();
        let stripped = trimmed
            .strip_prefix("go")
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);

        if let Some(caps) = GO_TAG_RE.captures(stripped) {
            let number = |i: usize| -> Result<u64, GvmError> {
                caps.get(i)
                    .map_or(Ok(0), |m| m.as_str().parse::<u64>())
                    .map_err(|_| GvmError::InvalidVersion(input.to_string()))
            };
            let mut version = semver::Version::new(number(1)?, number(2)?, number(3)?);
            if let (Some(kind), Some(n)) = (caps.get(4), caps.get(5)) {
                let n: u64 = n
                    .as_str()
                    .parse()
                    .map_err(|_| GvmError::InvalidVersion(input.to_string()))?;
                version.pre = semver::Prerelease::new(&format!("{}.{}", kind.as_str(), n))
                    .map_err(|_| GvmError::InvalidVersion(input.to_string()))?;
            }
            return Ok(Self(version));
        }

        semver::Version::parse(stripped)
            .map(Self)
            .map_err(|_| GvmError::InvalidVersion(input.to_string()))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }

    /// Compares by semver precedence only, ignoring build metadata
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.0.major, self.0.minor, self.0.patch, &self.0.pre).cmp(&(
            other.0.major,
            other.0.minor,
            other.0.patch,
            &other.0.pre,
        ))
    }

    /// Go release tag for this version, e.g. `go1.20`, `go1.21.0`, `go1.22rc1`
    pub fn go_tag(&self) -> String {
        let v = &self.0;
        if !v.build.is_empty() {
            return format!("go{}", v);
        }

        if v.pre.is_empty() {
            // Before 1.21 the first release of a minor line had no patch component
            if v.major == 1 && v.minor < 21 && v.patch == 0 {
                return format!("go{}.{}", v.major, v.minor);
            }
            return format!("go{}.{}.{}", v.major, v.minor, v.patch);
        }

        match GO_PRE_RE.captures(v.pre.as_str()) {
            Some(caps) if v.patch == 0 => {
                format!("go{}.{}{}{}", v.major, v.minor, &caps[1], &caps[2])
            }
            _ => format!("go{}", v),
        }
    }

    /// Directory name of an installed toolchain
    pub fn dir_name(&self) -> String {
        format!("go{}", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = GvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Newest stable patch release of the `major.minor` line among `available`
pub fn latest_patch<'a>(
    major: u64,
    minor: u64,
    available: impl IntoIterator<Item = &'a Version>,
) -> Option<Version> {
    available
        .into_iter()
        .filter(|v| v.major() == major && v.minor() == minor && !v.is_prerelease())
        .max()
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[rstest]
    #[case("go1.21.3", "1.21.3")]
    #[case("go1.20", "1.20.0")]
    #[case("go1.22rc1", "1.22.0-rc.1")]
    #[case("1.9beta2", "1.9.0-beta.2")]
    #[case("go1.8alpha1", "1.8.0-alpha.1")]
    #[case("v1.21.0", "1.21.0")]
    #[case("1.22.0-rc.1+x", "1.22.0-rc.1+x")]
    #[case(" 1.21.0 ", "1.21.0")]
    fn parse_accepts_go_tags_and_semver(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(v(input).to_string(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("go")]
    #[case("latest")]
    #[case("1")]
    #[case("1.21.x")]
    #[case("1.21.0.1")]
    #[case("go1.21rc")]
    fn parse_rejects_invalid_input(#[case] input: &str) {
        assert!(matches!(
            Version::parse(input),
            Err(GvmError::InvalidVersion(_))
        ));
    }

    #[rstest]
    #[case("1.20.0", "go1.20")]
    #[case("1.20.7", "go1.20.7")]
    #[case("1.21.0", "go1.21.0")]
    #[case("1.22.0-rc.1", "go1.22rc1")]
    #[case("1.9.0-beta.2", "go1.9beta2")]
    #[case("2.0.0", "go2.0.0")]
    fn go_tag_renders_upstream_release_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(v(input).go_tag(), expected);
    }

    #[test]
    fn go_tag_round_trips_through_parse() {
        for tag in ["go1.20", "go1.21.0", "go1.22rc2", "go1.9beta2", "go1.19.13"] {
            assert_eq!(v(tag).go_tag(), tag);
        }
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert!(v("go1.22rc1") < v("go1.22.0"));
        assert!(v("go1.22beta1") < v("go1.22rc1"));
        assert!(v("go1.21.9") < v("go1.22rc1"));
    }

    #[test]
    fn numeric_fields_compare_numerically() {
        assert!(v("1.9.0") < v("1.10.0"));
        assert!(v("1.21.2") < v("1.21.10"));
    }

    #[test]
    fn build_metadata_breaks_ties_but_not_precedence() {
        let a = v("1.21.0+a");
        let b = v("1.21.0+b");

        assert_eq!(a.cmp_precedence(&b), Ordering::Equal);
        assert_ne!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Less);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&v("go1.21.3")).unwrap();
        assert_eq!(json, "\"1.21.3\"");

        let parsed: Version = serde_json::from_str("\"go1.20\"").unwrap();
        assert_eq!(parsed, v("1.20.0"));
    }

    #[test]
    fn dir_name_uses_semver_form() {
        assert_eq!(v("go1.20").dir_name(), "go1.20.0");
        assert_eq!(v("go1.22rc1").dir_name(), "go1.22.0-rc.1");
    }

    #[rstest]
    #[case(&["1.21.0", "1.21.5", "1.22.0", "1.21.6-rc.1"], Some("1.21.5"))]
    #[case(&["1.21.0"], Some("1.21.0"))]
    #[case(&["1.22.0", "1.20.3"], None)]
    #[case(&[], None)]
    fn latest_patch_picks_newest_stable_patch(
        #[case] available: &[&str],
        #[case] expected: Option<&str>,
    ) {
        let available: Vec<Version> = available.iter().map(|s| v(s)).collect();
        assert_eq!(latest_patch(1, 21, &available), expected.map(v));
    }
}
