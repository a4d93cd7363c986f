//! Keeps registry entries consistent with the clusters they point at.

use tracing::{debug, info};

use crate::prompt::Prompter;

use super::{EnvironmentRecord, LOCAL_ENVIRONMENT, RegistryError, RegistryStore};

/// Result of reconciling one environment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconcileOutcome {
    /// A new environment was written.
    Created,
    /// An existing environment was repointed.
    Updated,
    /// The environment already pointed at the endpoint.
    Unchanged,
    /// The user chose to keep the existing environment.
    Declined,
}

impl ReconcileOutcome {
    /// User-facing summary, when there is anything to say.
    #[must_use]
    pub fn describe(self, name: &str) -> Option<String> {
        let hint = format!(
            "pass `--env {name}` to commands that talk to the operator to use this cluster"
        );
        match self {
            Self::Created => Some(format!(
                "an environment named \"{name}\" has been configured for this cluster; {hint}"
            )),
            Self::Updated => Some(format!(
                "the environment named \"{name}\" has been updated to point to this cluster; {hint}"
            )),
            Self::Unchanged | Self::Declined => None,
        }
    }
}

/// Environments removed because their cluster was torn down.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Removal {
    /// Names removed, in registry order.
    pub names: Vec<String>,
    /// Whether the default environment was among them and was reset.
    pub default_reset: bool,
}

/// Creates, updates, and removes environments for a cluster endpoint.
pub struct Reconciler<'a> {
    store: &'a dyn RegistryStore,
    prompter: &'a dyn Prompter,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(store: &'a dyn RegistryStore, prompter: &'a dyn Prompter) -> Self {
        Self { store, prompter }
    }

    /// Points environment `name` at `endpoint`.
    ///
    /// A missing environment is created. One that already points at the
    /// endpoint is left alone. One pointing elsewhere is updated after
    /// confirmation, or straight away when `disallow_prompt` is set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Reserved`] for `local`, and store or prompt
    /// failures otherwise.
    pub fn reconcile(
        &self,
        name: &str,
        endpoint: &str,
        disallow_prompt: bool,
    ) -> Result<ReconcileOutcome, RegistryError> {
        if name == LOCAL_ENVIRONMENT {
            return Err(RegistryError::Reserved(name.to_owned()));
        }

        let Some(existing) = self.store.get(name)? else {
            self.store.upsert(EnvironmentRecord::new(name, endpoint))?;
            info!(environment = name, endpoint, "created environment");
            return Ok(ReconcileOutcome::Created);
        };

        if existing.operator_endpoint == endpoint {
            debug!(environment = name, "environment already points at this cluster");
            return Ok(ReconcileOutcome::Unchanged);
        }

        if !disallow_prompt {
            let question = format!(
                "found an existing environment named \"{name}\" which points to {}; would you like to update it to point to this cluster ({endpoint})?",
                existing.operator_endpoint
            );
            if !self.prompter.confirm(&question)? {
                return Ok(ReconcileOutcome::Declined);
            }
        }
        self.store.upsert(EnvironmentRecord::new(name, endpoint))?;
        info!(environment = name, endpoint, previous = %existing.operator_endpoint, "updated environment");
        Ok(ReconcileOutcome::Updated)
    }

    /// Removes every environment pointing at `endpoint`. When the default
    /// environment is removed the default becomes `local`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be updated.
    pub fn remove_by_endpoint(&self, endpoint: &str) -> Result<Removal, RegistryError> {
        let matches = self.store.find_by_endpoint(endpoint)?;
        if matches.is_empty() {
            return Ok(Removal::default());
        }
        let default = self.store.default_environment()?;

        let mut removal = Removal::default();
        for record in matches {
            self.store.remove(&record.name)?;
            if default.as_deref() == Some(record.name.as_str()) {
                removal.default_reset = true;
            }
            removal.names.push(record.name);
        }
        if removal.default_reset {
            self.store.set_default(LOCAL_ENVIRONMENT)?;
        }
        info!(endpoint, removed = ?removal.names, "removed environments");
        Ok(removal)
    }
}
