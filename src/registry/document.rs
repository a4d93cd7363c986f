//! In-memory form of the registry file.

use serde::{Deserialize, Serialize};

use super::EnvironmentRecord;

/// Contents of the registry file.
///
/// ```toml
/// default_environment = "gcp"
///
/// [[environments]]
/// name = "gcp"
/// provider = "gcp"
/// operator_endpoint = "https://34.1.2.3"
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Default environment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,
    /// Stored environments, unique by name.
    #[serde(default)]
    pub environments: Vec<EnvironmentRecord>,
}

impl RegistryDocument {
    /// Looks up an environment by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EnvironmentRecord> {
        self.environments.iter().find(|record| record.name == name)
    }

    /// Environments pointing at `endpoint`.
    #[must_use]
    pub fn find_by_endpoint(&self, endpoint: &str) -> Vec<EnvironmentRecord> {
        self.environments
            .iter()
            .filter(|record| record.operator_endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Inserts or replaces by name, keeping the original position.
    pub fn upsert(&mut self, record: EnvironmentRecord) {
        match self
            .environments
            .iter_mut()
            .find(|existing| existing.name == record.name)
        {
            Some(existing) => *existing = record,
            None => self.environments.push(record),
        }
    }

    /// Removes by name. Returns `false` when absent.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.environments.len();
        self.environments.retain(|record| record.name != name);
        self.environments.len() != before
    }
}
