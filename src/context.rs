//! Per-invocation inputs, parsed once from the command line.

use camino::Utf8Path;

use crate::access::{AccessError, AccessOverrides, ClusterConfigFile};
use crate::registry::LOCAL_ENVIRONMENT;

/// Everything a lifecycle command needs to know about how it was invoked.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandContext {
    /// Coordinates given as flags.
    pub overrides: AccessOverrides,
    /// Contents of the `--config` file, empty when none was given.
    pub cluster_file: ClusterConfigFile,
    /// Environment to create or repoint (`--configure-env`).
    pub environment: Option<String>,
    /// `--yes`: never ask, take the safe explicit default instead.
    pub disallow_prompt: bool,
}

impl CommandContext {
    /// Builds a context, loading the cluster configuration file if given.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::ConfigFile`] when the file cannot be read and
    /// [`AccessError::ReservedEnvironment`] when `environment` is the
    /// reserved local environment.
    pub fn new(
        overrides: AccessOverrides,
        config_path: Option<&Utf8Path>,
        environment: Option<String>,
        disallow_prompt: bool,
    ) -> Result<Self, AccessError> {
        if let Some(name) = environment.as_deref()
            && name == LOCAL_ENVIRONMENT
        {
            return Err(AccessError::ReservedEnvironment(name.to_owned()));
        }
        let cluster_file = config_path
            .map(ClusterConfigFile::load)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            overrides,
            cluster_file,
            environment,
            disallow_prompt,
        })
    }

    /// Coordinates from flags, with gaps filled from the file.
    #[must_use]
    pub fn access_overrides(&self) -> AccessOverrides {
        self.overrides.or_file(&self.cluster_file)
    }
}
