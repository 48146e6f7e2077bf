//! Shared filesystem helpers built on `cap-std` and `camino`.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// What a path refers to on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Anything else, such as a socket or device.
    Other,
    /// Nothing exists at the path.
    Missing,
}

/// Resolve an ambient directory for the given path and return the directory with the file name.
fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Read a whole file through its parent directory handle.
pub fn read_file(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read(name.as_str())
}

/// Write a whole file through its parent directory handle.
pub fn write_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.write(name.as_str(), contents)
}

/// Classify `path` without following it into its contents.
pub fn path_kind(path: &Utf8Path) -> io::Result<PathKind> {
    if path.file_name().is_none() {
        return fs_utf8::Dir::open_ambient_dir(path, ambient_authority()).map_or_else(
            |err| missing_or(err),
            |_| Ok(PathKind::Directory),
        );
    }
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) => return missing_or(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) if meta.is_file() => Ok(PathKind::File),
        Ok(meta) if meta.is_dir() => Ok(PathKind::Directory),
        Ok(_) => Ok(PathKind::Other),
        Err(err) => missing_or(err),
    }
}

fn missing_or(err: io::Error) -> io::Result<PathKind> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(PathKind::Missing)
    } else {
        Err(err)
    }
}

/// List the entries of a directory, sorted by file name. Not recursive.
pub fn list_dir_sorted(path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let dir = fs_utf8::Dir::open_ambient_dir(path, ambient_authority())?;
    let mut names = dir
        .entries()?
        .map(|entry| entry.and_then(|e| e.file_name()))
        .collect::<io::Result<Vec<String>>>()?;
    names.sort();
    Ok(names.into_iter().map(|name| path.join(name)).collect())
}

/// Write `contents` to `relative` beneath `root`, creating directories as
/// needed. Paths that would escape `root` are refused by the capability
/// handle.
pub fn write_beneath(root: &Utf8Path, relative: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let dir = fs_utf8::Dir::open_ambient_dir(root, ambient_authority())?;
    if let Some(parent) = relative.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent)?;
    }
    dir.write(relative, contents)
}

/// Create the directory `relative` beneath `root`.
pub fn create_dir_beneath(root: &Utf8Path, relative: &Utf8Path) -> io::Result<()> {
    let dir = fs_utf8::Dir::open_ambient_dir(root, ambient_authority())?;
    dir.create_dir_all(relative)
}

/// Ensure the parent directory for `path` exists, handling absolute paths safely for cap-std.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base_dir, relative) = base_dir_and_relative(parent)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)?;
    Ok(())
}

/// Split an absolute or relative parent path into an ambient base directory and a relative suffix.
fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        // Unix-style absolute path.
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        // Relative path: resolve from the current directory.
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other("non-UTF-8 parent path"))?;

    Ok((dir, relative))
}
