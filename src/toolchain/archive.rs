//! Archive extraction for Go SDK archives
//!
//! Go publishes `.tar.gz` archives for unix platforms and `.zip` archives for
//! Windows, both with every entry under a single `go/` folder. That common
//! root is stripped so the SDK lands directly in the destination directory.
//! Entries with absolute paths or `..` components are rejected, as are
//! hard links, symlinks pointing outside the destination, and entries that
//! would be written through a symlink extracted earlier.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::debug;

use crate::error::GvmError;

/// Extracts a `.tar.gz` or `.zip` archive into `dest_dir`
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), GvmError> {
    let name = archive_path.to_string_lossy();
    if name.ends_with(".zip") {
        extract_zip(archive_path, dest_dir)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive_path, dest_dir)
    } else {
        Err(archive_error(archive_path, "unsupported archive format"))
    }
}

pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), GvmError> {
    std::fs::create_dir_all(dest_dir)?;

    let entry_paths = {
        let mut archive = open_tar(archive_path)?;
        let entries = archive
            .entries()
            .map_err(|e| archive_error(archive_path, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| archive_error(archive_path, e))?;
            let path = entry
                .path()
                .map_err(|e| archive_error(archive_path, e))?
                .into_owned();
            paths.push(path);
        }
        paths
    };
    let strip_prefix = common_root(&entry_paths);

    let mut archive = open_tar(archive_path)?;
    archive.set_preserve_permissions(true);
    let entries = archive
        .entries()
        .map_err(|e| archive_error(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive_path, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| archive_error(archive_path, e))?
            .into_owned();

        let Some(relative_path) = relative_output(archive_path, &entry_path, &strip_prefix)?
        else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);
        ensure_no_symlink_ancestors(archive_path, dest_dir, &relative_path)?;

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Link => {
                return Err(archive_error(
                    archive_path,
                    format!("refusing to extract hard link {}", relative_path.display()),
                ));
            }
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .map_err(|e| archive_error(archive_path, e))?
                    .ok_or_else(|| archive_error(archive_path, "symlink without target"))?
                    .into_owned();
                check_symlink_target(archive_path, &relative_path, &target)?;
            }
            _ => {}
        }

        if entry_type.is_dir() {
            std::fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry
                .unpack(&output_path)
                .map_err(|e| archive_error(archive_path, format!("{}: {}", relative_path.display(), e)))?;
        }
    }

    debug!("Extracted {:?} into {:?}", archive_path, dest_dir);
    Ok(())
}

pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), GvmError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;

    std::fs::create_dir_all(dest_dir)?;

    let entry_paths: Vec<PathBuf> = archive.file_names().map(PathBuf::from).collect();
    let strip_prefix = common_root(&entry_paths);

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(archive_path, e))?;

        let entry_path = PathBuf::from(entry.name());
        let Some(relative_path) = relative_output(archive_path, &entry_path, &strip_prefix)?
        else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);
        ensure_no_symlink_ancestors(archive_path, dest_dir, &relative_path)?;

        if entry.is_dir() {
            std::fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&output_path)?;
            std::io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&output_path, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    debug!("Extracted {:?} into {:?}", archive_path, dest_dir);
    Ok(())
}

fn open_tar(archive_path: &Path) -> Result<Archive<GzDecoder<File>>, GvmError> {
    let file = File::open(archive_path)?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Path of an entry below the destination, `None` for the stripped root itself
fn relative_output(
    archive_path: &Path,
    entry_path: &Path,
    strip_prefix: &Option<PathBuf>,
) -> Result<Option<PathBuf>, GvmError> {
    if entry_path.is_absolute()
        || entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(archive_error(
            archive_path,
            format!("refusing to extract unsafe path {}", entry_path.display()),
        ));
    }

    let relative = match strip_prefix {
        Some(prefix) => match entry_path.strip_prefix(prefix) {
            Ok(p) => p.to_path_buf(),
            Err(_) => entry_path.to_path_buf(),
        },
        None => entry_path.to_path_buf(),
    };

    let relative: PathBuf = relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

/// A symlink at `link` (relative to the destination) must resolve inside it
fn check_symlink_target(archive_path: &Path, link: &Path, target: &Path) -> Result<(), GvmError> {
    let escapes = || {
        archive_error(
            archive_path,
            format!(
                "refusing symlink {} -> {} pointing outside the archive",
                link.display(),
                target.display()
            ),
        )
    };

    let mut depth = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(escapes)?,
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }
    Ok(())
}

// Writing below a symlink would follow it out of the destination
fn ensure_no_symlink_ancestors(
    archive_path: &Path,
    dest_dir: &Path,
    relative_path: &Path,
) -> Result<(), GvmError> {
    let Some(parent) = relative_path.parent() else {
        return Ok(());
    };

    let mut current = dest_dir.to_path_buf();
    for component in parent.components() {
        current.push(component);
        if std::fs::symlink_metadata(&current).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(archive_error(
                archive_path,
                format!(
                    "refusing to extract {} through symlink {}",
                    relative_path.display(),
                    current.display()
                ),
            ));
        }
    }
    Ok(())
}

/// Folder shared by every entry, if entries are nested below one
fn common_root(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut common: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for path in paths {
        let mut components = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir));
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_some() {
            has_nested_entries = true;
        }

        let root = PathBuf::from(first.as_os_str());
        match &common {
            None => common = Some(root),
            Some(existing) if existing != &root => return None,
            Some(_) => {}
        }
    }

    if has_nested_entries { common } else { None }
}

fn archive_error(path: &Path, reason: impl std::fmt::Display) -> GvmError {
    GvmError::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
