//! On-disk cache of resolved access coordinates.
//!
//! Each resolved cluster is written to its own TOML file so `info` and
//! `down` can find it again without the user repeating every flag.

use camino::{Utf8Path, Utf8PathBuf};

use crate::store::{self, StoreError};

use super::AccessConfig;

const CACHE_SUFFIX: &str = ".toml";

/// Storage for previously resolved access coordinates.
pub trait AccessCacheStore {
    /// Returns every cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the cache cannot be read.
    fn load_all(&self) -> Result<Vec<AccessConfig>, StoreError>;

    /// Records `access`, replacing an identical entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the entry cannot be written.
    fn store(&self, access: &AccessConfig) -> Result<(), StoreError>;

    /// Deletes the entry for `access`. Returns `false` when none existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the entry cannot be deleted.
    fn remove(&self, access: &AccessConfig) -> Result<bool, StoreError>;
}

/// File name of the cache entry for `access`.
#[must_use]
pub fn cache_file_name(access: &AccessConfig) -> String {
    format!(
        "gcp_{}_{}_{}{CACHE_SUFFIX}",
        access.project, access.zone, access.cluster_name
    )
}

/// Access cache rooted at a directory, one file per cluster.
#[derive(Clone, Debug)]
pub struct AccessCache {
    dir: Utf8PathBuf,
}

impl AccessCache {
    /// Creates a cache rooted at `dir`. The directory is created lazily.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache entries.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn path_for(&self, access: &AccessConfig) -> Utf8PathBuf {
        self.dir.join(cache_file_name(access))
    }
}

impl AccessCacheStore for AccessCache {
    fn load_all(&self) -> Result<Vec<AccessConfig>, StoreError> {
        let mut entries = Vec::new();
        for path in store::list_files(&self.dir, CACHE_SUFFIX)? {
            match store::read_toml::<AccessConfig>(&path) {
                Ok(Some(access)) => entries.push(access),
                Ok(None) => {}
                Err(err) => tracing::warn!(path = %path, error = %err, "skipping unreadable access cache entry"),
            }
        }
        Ok(entries)
    }

    fn store(&self, access: &AccessConfig) -> Result<(), StoreError> {
        store::write_toml(&self.path_for(access), access)
    }

    fn remove(&self, access: &AccessConfig) -> Result<bool, StoreError> {
        store::remove_optional(&self.path_for(access))
    }
}
