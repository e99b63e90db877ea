//! Shell integration written by `gvm init`

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::GvmError;
use crate::toolchain::paths::GvmPaths;

/// Comment line preceding the hook in the rc file
pub const HOOK_MARKER: &str = "# gvm shell setup";

/// rc files probed in order; the first existing one is hooked
const RC_FILES: [&str; 2] = [".zshrc", ".bashrc"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSetup {
    pub env_file: PathBuf,
    /// rc file that sources `env_file`, if one was found
    pub rc_file: Option<PathBuf>,
    /// Whether the hook was added by this call
    pub hooked: bool,
}

/// POSIX shell snippet exporting GOROOT and PATH for the active toolchain
pub fn env_script(paths: &GvmPaths) -> String {
    let goroot = paths.goroot_link();
    format!(
        "# Generated by gvm; sourced from your shell rc file\n\
         export GOROOT=\"{}\"\n\
         export GOPATH=\"${{GOPATH:-$HOME/go}}\"\n\
         case \":$PATH:\" in\n\
         \x20 *\":$GOROOT/bin:\"*) ;;\n\
         \x20 *) export PATH=\"$GOROOT/bin:$GOPATH/bin:$PATH\" ;;\n\
         esac\n",
        goroot.display()
    )
}

/// First existing rc file under `home`
pub fn detect_rc_file(home: &Path) -> Option<PathBuf> {
    RC_FILES
        .iter()
        .map(|name| home.join(name))
        .find(|path| path.is_file())
}

/// Appends a guarded `source` of `env_file` to `rc_file` unless already present
pub fn hook_rc_file(rc_file: &Path, env_file: &Path) -> Result<bool, GvmError> {
    let existing = match std::fs::read_to_string(rc_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let env = env_file.display().to_string();
    if existing.contains(HOOK_MARKER) || existing.contains(&env) {
        debug!("{:?} already sources {:?}", rc_file, env_file);
        return Ok(false);
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(rc_file)?;
    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    write!(
        file,
        "{}\n{}\nif [ -f \"{}\" ]; then\n    . \"{}\"\nfi\n",
        separator, HOOK_MARKER, env, env
    )?;

    info!("Added gvm hook to {:?}", rc_file);
    Ok(true)
}

/// Writes `<home>/env` and hooks it into the user's rc file
pub fn init_shell(paths: &GvmPaths, user_home: Option<&Path>) -> Result<ShellSetup, GvmError> {
    std::fs::create_dir_all(paths.root())?;
    let env_file = paths.env_file();
    std::fs::write(&env_file, env_script(paths))?;

    let rc_file = user_home.and_then(detect_rc_file);
    let hooked = match &rc_file {
        Some(rc) => hook_rc_file(rc, &env_file)?,
        None => false,
    };

    Ok(ShellSetup {
        env_file,
        rc_file,
        hooked,
    })
}
