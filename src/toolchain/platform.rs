//! Platform detection
//!
//! Maps the Rust target OS and architecture onto the `os`/`arch` names used
//! by the Go release index (`linux`/`amd64`, `darwin`/`arm64`, ...).

use std::fmt;

use crate::error::GvmError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Detects the platform this binary runs on
    pub fn detect() -> Result<Self, GvmError> {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn from_rust(os: &str, arch: &str) -> Result<Self, GvmError> {
        let go_os = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "windows" => "windows",
            "freebsd" => "freebsd",
            "openbsd" => "openbsd",
            "netbsd" => "netbsd",
            "illumos" => "illumos",
            _ => return Err(unsupported(os, arch)),
        };

        let go_arch = match arch {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            "arm" => "armv6l",
            "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
            "powerpc64" => "ppc64",
            "s390x" => "s390x",
            "riscv64" => "riscv64",
            "loongarch64" => "loong64",
            _ => return Err(unsupported(os, arch)),
        };

        Ok(Self::new(go_os, go_arch))
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Name of the `go` executable
    pub fn go_binary(&self) -> &'static str {
        if self.is_windows() { "go.exe" } else { "go" }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn unsupported(os: &str, arch: &str) -> GvmError {
    GvmError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    }
}
