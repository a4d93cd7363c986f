//! In-memory access cache and environment registry.

use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;

use crate::access::{AccessCacheStore, AccessConfig};
use crate::registry::{EnvironmentRecord, RegistryDocument, RegistryError, RegistryStore};
use crate::store::StoreError;

use super::locked;

fn unreadable(what: &str) -> StoreError {
    StoreError::Io {
        path: Utf8PathBuf::from(what),
        message: String::from("simulated failure"),
    }
}

/// Access cache held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryAccessCache {
    entries: Arc<Mutex<Vec<AccessConfig>>>,
    failing: bool,
}

impl MemoryAccessCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache whose every operation fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Adds an entry without going through [`AccessCacheStore::store`].
    pub fn seed(&self, access: AccessConfig) {
        locked(&self.entries).push(access);
    }

    /// Current entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AccessConfig> {
        locked(&self.entries).clone()
    }
}

impl AccessCacheStore for MemoryAccessCache {
    fn load_all(&self) -> Result<Vec<AccessConfig>, StoreError> {
        if self.failing {
            return Err(unreadable("cluster-configs"));
        }
        Ok(self.entries())
    }

    fn store(&self, access: &AccessConfig) -> Result<(), StoreError> {
        if self.failing {
            return Err(unreadable("cluster-configs"));
        }
        let mut entries = locked(&self.entries);
        entries.retain(|existing| existing != access);
        entries.push(access.clone());
        Ok(())
    }

    fn remove(&self, access: &AccessConfig) -> Result<bool, StoreError> {
        if self.failing {
            return Err(unreadable("cluster-configs"));
        }
        let mut entries = locked(&self.entries);
        let before = entries.len();
        entries.retain(|existing| existing != access);
        Ok(entries.len() != before)
    }
}

/// Environment registry held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    document: Arc<Mutex<RegistryDocument>>,
    failing: bool,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose every operation fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Adds an environment.
    pub fn seed(&self, name: &str, endpoint: &str) {
        locked(&self.document).upsert(EnvironmentRecord::new(name, endpoint));
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> RegistryDocument {
        locked(&self.document).clone()
    }

    fn check(&self) -> Result<(), RegistryError> {
        if self.failing {
            return Err(unreadable("environments.toml").into());
        }
        Ok(())
    }
}

impl RegistryStore for MemoryRegistry {
    fn get(&self, name: &str) -> Result<Option<EnvironmentRecord>, RegistryError> {
        self.check()?;
        Ok(locked(&self.document).get(name).cloned())
    }

    fn find_by_endpoint(&self, endpoint: &str) -> Result<Vec<EnvironmentRecord>, RegistryError> {
        self.check()?;
        Ok(locked(&self.document).find_by_endpoint(endpoint))
    }

    fn upsert(&self, record: EnvironmentRecord) -> Result<(), RegistryError> {
        self.check()?;
        locked(&self.document).upsert(record);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        self.check()?;
        Ok(locked(&self.document).remove(name))
    }

    fn default_environment(&self) -> Result<Option<String>, RegistryError> {
        self.check()?;
        Ok(locked(&self.document).default_environment.clone())
    }

    fn set_default(&self, name: &str) -> Result<(), RegistryError> {
        self.check()?;
        locked(&self.document).default_environment = Some(name.to_owned());
        Ok(())
    }
}
