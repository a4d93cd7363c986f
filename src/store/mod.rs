//! TOML files under the local state directory.
//!
//! The environment registry and the access cache both keep small TOML
//! documents on disk. These helpers open the parent directory through
//! `cap-std` and treat a missing file as an empty document.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::toml;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;


/// Errors raised while reading or writing state files.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StoreError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when stored TOML cannot be parsed or rendered.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a path has no file name component.
    #[error("state file path {path} is missing a filename")]
    MissingFileName {
        /// Offending path.
        path: Utf8PathBuf,
    },
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| StoreError::MissingFileName {
        path: path.to_path_buf(),
    })?;
    Ok((parent, file_name))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Reads `path` as UTF-8, returning `None` when the file or its directory
/// does not exist.
///
/// # Errors
///
/// Returns [`StoreError::Io`] for any other file system failure.
pub fn read_optional(path: &Utf8Path) -> Result<Option<String>, StoreError> {
    let (parent, file_name) = split(path)?;
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(parent, &err)),
    };
    match dir.read_to_string(file_name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(path, &err)),
    }
}

/// Reads and deserializes a TOML document. Missing and blank files yield
/// `None`.
///
/// # Errors
///
/// Returns [`StoreError`] when the file cannot be read or parsed.
pub fn read_toml<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>, StoreError> {
    let Some(contents) = read_optional(path)? else {
        return Ok(None);
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    toml::from_str(&contents)
        .map(Some)
        .map_err(|err| StoreError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Serializes `value` and replaces `path`, creating parent directories.
/// The document is written next to the target and renamed into place.
///
/// # Errors
///
/// Returns [`StoreError`] when rendering or any file system step fails.
pub fn write_toml<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), StoreError> {
    let (parent, file_name) = split(path)?;
    let rendered = toml::to_string_pretty(value).map_err(|err| StoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    Dir::create_ambient_dir_all(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;

    let staging = format!(".{file_name}.tmp");
    dir.write(&staging, rendered)
        .map_err(|err| io_error(path, &err))?;
    dir.rename(&staging, &dir, file_name)
        .map_err(|err| io_error(path, &err))
}

/// Removes `path`. Returns `false` when there was nothing to remove.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when removal fails for another reason.
pub fn remove_optional(path: &Utf8Path) -> Result<bool, StoreError> {
    let (parent, file_name) = split(path)?;
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_error(parent, &err)),
    };
    match dir.remove_file(file_name) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_error(path, &err)),
    }
}

/// Lists the regular files in `dir_path` whose names end with `suffix`,
/// sorted by name. A missing directory yields an empty list.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when the directory cannot be read.
pub fn list_files(dir_path: &Utf8Path, suffix: &str) -> Result<Vec<Utf8PathBuf>, StoreError> {
    let dir = match Dir::open_ambient_dir(dir_path, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error(dir_path, &err)),
    };
    let entries = dir.entries().map_err(|err| io_error(dir_path, &err))?;

    let mut files = Vec::new();
    for item in entries {
        let entry = item.map_err(|err| io_error(dir_path, &err))?;
        let is_file = entry
            .file_type()
            .map_err(|err| io_error(dir_path, &err))?
            .is_file();
        let name = entry.file_name().map_err(|err| io_error(dir_path, &err))?;
        if is_file && name.ends_with(suffix) && !name.starts_with('.') {
            files.push(dir_path.join(name));
        }
    }
    files.sort();
    Ok(files)
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// When `HOME` is unset the input is returned unchanged.
#[must_use]
pub fn expand_tilde(path: &str) -> Utf8PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return Utf8PathBuf::from(format!("{}/{rest}", home.to_string_lossy()));
    }
    Utf8PathBuf::from(path)
}
