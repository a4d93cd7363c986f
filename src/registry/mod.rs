//! Named CLI environments that point at operator endpoints.
//!
//! The registry is a small TOML document in the state directory. The
//! reserved `local` environment is never stored; it is what the default
//! falls back to when the environment it named is removed.

mod document;
mod file;
mod reconcile;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompt::PromptError;
use crate::store::StoreError;

pub use document::RegistryDocument;
pub use file::FileRegistry;
pub use reconcile::{ReconcileOutcome, Reconciler, Removal};

/// Reserved environment name that targets a locally running operator.
pub const LOCAL_ENVIRONMENT: &str = "local";
/// Provider tag stored on environments created by this tool.
pub const PROVIDER_TAG: &str = "gcp";

/// One named environment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    /// Environment name.
    pub name: String,
    /// Provider that hosts the operator.
    pub provider: String,
    /// Operator URL, always `https://<address>`.
    pub operator_endpoint: String,
}

impl EnvironmentRecord {
    /// Creates a record for a cluster managed by this tool.
    #[must_use]
    pub fn new(name: impl Into<String>, operator_endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: PROVIDER_TAG.to_owned(),
            operator_endpoint: operator_endpoint.into(),
        }
    }
}

/// Errors raised by the environment registry.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RegistryError {
    /// Reading or writing the registry file failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Confirmation could not be obtained.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// The reserved environment name was used.
    #[error("the `{0}` environment is reserved")]
    Reserved(String),
}

/// Persistence for environment records and the default environment.
pub trait RegistryStore {
    /// Looks up an environment by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be read.
    fn get(&self, name: &str) -> Result<Option<EnvironmentRecord>, RegistryError>;

    /// Returns every environment pointing at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be read.
    fn find_by_endpoint(&self, endpoint: &str) -> Result<Vec<EnvironmentRecord>, RegistryError>;

    /// Inserts or replaces the environment named `record.name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be written.
    fn upsert(&self, record: EnvironmentRecord) -> Result<(), RegistryError>;

    /// Removes an environment. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be written.
    fn remove(&self, name: &str) -> Result<bool, RegistryError>;

    /// Name of the default environment, if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be read.
    fn default_environment(&self) -> Result<Option<String>, RegistryError>;

    /// Sets the default environment.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be written.
    fn set_default(&self, name: &str) -> Result<(), RegistryError>;
}
