//! Version specifiers accepted on the command line and in pin files

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use semver::VersionReq;

use crate::error::GvmError;
use crate::version::Version;

// `1`, `1.21`: a whole major or minor line. `go1.21` is a release tag instead.
static PARTIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+)(?:\.(\d+))?$").expect("valid regex"));

const CONSTRAINT_CHARS: &[char] = &['x', 'X', '*', '>', '<', '=', '^', '~', ','];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpecifier {
    Exact(Version),
    /// Range such as `1.20.x`, `>=1.21, <1.23` or `1.21` (the whole `1.21` line)
    Constraint(VersionReq),
    /// Newest version known, pre-releases included
    Latest,
    /// Newest stable version known
    Stable,
    /// The `go` found on `PATH` outside of gvm
    System,
    /// Whatever the project in this directory pins
    Pinned(PathBuf),
}

impl VersionSpecifier {
    pub fn parse(input: &str) -> Result<Self, GvmError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "empty specifier"));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "latest" => return Ok(VersionSpecifier::Latest),
            "stable" => return Ok(VersionSpecifier::Stable),
            "system" => return Ok(VersionSpecifier::System),
            _ => {}
        }

        if let Some(caps) = PARTIAL_RE.captures(trimmed) {
            let req = match caps.get(2) {
                Some(minor) => format!("={}.{}", &caps[1], minor.as_str()),
                None => format!("={}", &caps[1]),
            };
            return VersionReq::parse(&req)
                .map(VersionSpecifier::Constraint)
                .map_err(|e| invalid(input, e));
        }

        if trimmed.contains(CONSTRAINT_CHARS) {
            let req = trimmed.strip_prefix("go").unwrap_or(trimmed);
            return VersionReq::parse(req)
                .map(VersionSpecifier::Constraint)
                .map_err(|e| invalid(input, e));
        }

        Version::parse(trimmed)
            .map(VersionSpecifier::Exact)
            .map_err(|_| invalid(input, "not a version, range or keyword"))
    }

    /// Whether `version` satisfies this specifier on its own.
    ///
    /// `System` and `Pinned` need outside information and match nothing here.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpecifier::Exact(v) => v == version,
            VersionSpecifier::Constraint(req) => req.matches(version.as_semver()),
            VersionSpecifier::Latest => true,
            VersionSpecifier::Stable => !version.is_prerelease(),
            VersionSpecifier::System | VersionSpecifier::Pinned(_) => false,
        }
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpecifier::Exact(v) => write!(f, "{}", v),
            VersionSpecifier::Constraint(req) => write!(f, "{}", req),
            VersionSpecifier::Latest => write!(f, "latest"),
            VersionSpecifier::Stable => write!(f, "stable"),
            VersionSpecifier::System => write!(f, "system"),
            VersionSpecifier::Pinned(dir) => write!(f, "pinned ({})", dir.display()),
        }
    }
}

fn invalid(input: &str, reason: impl fmt::Display) -> GvmError {
    GvmError::InvalidSpecifier {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[rstest]
    #[case("latest", VersionSpecifier::Latest)]
    #[case("Stable", VersionSpecifier::Stable)]
    #[case("system", VersionSpecifier::System)]
    #[case("1.21.3", VersionSpecifier::Exact(v("1.21.3")))]
    #[case("go1.22rc1", VersionSpecifier::Exact(v("1.22.0-rc.1")))]
    #[case("go1.20", VersionSpecifier::Exact(v("1.20.0")))]
    #[case("go1.21.3", VersionSpecifier::Exact(v("1.21.3")))]
    fn parse_recognizes_keywords_and_exact_versions(
        #[case] input: &str,
        #[case] expected: VersionSpecifier,
    ) {
        assert_eq!(VersionSpecifier::parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case("1.20.x", "1.20.7", true)]
    #[case("1.20.x", "1.21.0", false)]
    #[case("1.21", "1.21.9", true)]
    #[case("1.21", "1.22.0", false)]
    #[case("v1.21", "1.21.4", true)]
    #[case("1.21.*", "1.21.4", true)]
    #[case("1", "1.22.1", true)]
    #[case(">=1.3", "1.21.0", true)]
    #[case(">=1.21, <1.22", "1.22.0", false)]
    #[case("1.21", "1.21.0-rc.1", false)]
    fn constraint_matching(#[case] input: &str, #[case] candidate: &str, #[case] expected: bool) {
        let spec = VersionSpecifier::parse(input).unwrap();
        assert!(matches!(spec, VersionSpecifier::Constraint(_)));
        assert_eq!(spec.matches(&v(candidate)), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("newest")]
    #[case(">=banana")]
    #[case("1.2.3.4")]
    fn parse_rejects_garbage(#[case] input: &str) {
        assert!(matches!(
            VersionSpecifier::parse(input),
            Err(GvmError::InvalidSpecifier { .. })
        ));
    }

    #[test]
    fn release_tag_matches_only_that_release() {
        let spec = VersionSpecifier::parse("go1.20").unwrap();

        assert!(spec.matches(&v("1.20.0")));
        assert!(!spec.matches(&v("1.20.14")));
        assert_eq!(Version::parse("go1.20").unwrap(), v("1.20.0"));
    }

    #[test]
    fn stable_excludes_prereleases() {
        assert!(VersionSpecifier::Stable.matches(&v("1.21.0")));
        assert!(!VersionSpecifier::Stable.matches(&v("go1.22rc1")));
        assert!(VersionSpecifier::Latest.matches(&v("go1.22rc1")));
    }

    #[test]
    fn display_round_trips_keywords() {
        for input in ["latest", "stable", "system", "1.21.3"] {
            assert_eq!(VersionSpecifier::parse(input).unwrap().to_string(), input);
        }
    }
}
