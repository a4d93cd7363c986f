//! Registry persisted as a TOML file.

use camino::{Utf8Path, Utf8PathBuf};

use crate::store;

use super::{EnvironmentRecord, RegistryDocument, RegistryError, RegistryStore};

/// Registry stored at a single TOML path. Every call re-reads the file so
/// concurrent CLI invocations see each other's changes.
#[derive(Clone, Debug)]
pub struct FileRegistry {
    path: Utf8PathBuf,
}

impl FileRegistry {
    /// Creates a registry backed by `path`; the file is created on first
    /// write.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<RegistryDocument, RegistryError> {
        Ok(store::read_toml(&self.path)?.unwrap_or_default())
    }

    fn update<T>(
        &self,
        change: impl FnOnce(&mut RegistryDocument) -> T,
    ) -> Result<T, RegistryError> {
        let mut document = self.load()?;
        let result = change(&mut document);
        store::write_toml(&self.path, &document)?;
        Ok(result)
    }
}

impl RegistryStore for FileRegistry {
    fn get(&self, name: &str) -> Result<Option<EnvironmentRecord>, RegistryError> {
        Ok(self.load()?.get(name).cloned())
    }

    fn find_by_endpoint(&self, endpoint: &str) -> Result<Vec<EnvironmentRecord>, RegistryError> {
        Ok(self.load()?.find_by_endpoint(endpoint))
    }

    fn upsert(&self, record: EnvironmentRecord) -> Result<(), RegistryError> {
        self.update(|document| document.upsert(record))
    }

    fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        self.update(|document| document.remove(name))
    }

    fn default_environment(&self) -> Result<Option<String>, RegistryError> {
        Ok(self.load()?.default_environment)
    }

    fn set_default(&self, name: &str) -> Result<(), RegistryError> {
        self.update(|document| document.default_environment = Some(name.to_owned()))
    }
}
