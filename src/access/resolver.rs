//! Resolves access coordinates from flags, files, the cache, and prompts.

use tracing::{debug, info, warn};

use crate::prompt::{PromptError, Prompter};

use super::{
    AccessCacheStore, AccessConfig, AccessError, AccessOverrides, ClusterConfig,
    ClusterConfigFile, DEFAULT_INSTANCE_TYPE, DEFAULT_MAX_INSTANCES, DEFAULT_MIN_INSTANCES,
};

/// Suggestions offered when prompting for coordinates of a new cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AccessDefaults {
    /// Project the configured credentials belong to.
    pub project: Option<String>,
}

struct Field {
    label: &'static str,
    flag: &'static str,
}

const CLUSTER_NAME: Field = Field {
    label: "cluster name",
    flag: "--name",
};
const PROJECT: Field = Field {
    label: "project",
    flag: "--project",
};
const ZONE: Field = Field {
    label: "zone",
    flag: "--zone",
};

/// Resolves [`AccessConfig`] and [`ClusterConfig`] values.
///
/// Explicit values always win. For existing clusters the access cache fills
/// gaps when exactly one cached cluster matches what was given; otherwise
/// the prompter is asked, with a matching cached value as its default. A prompter that refuses turns a gap into
/// [`AccessError::MissingField`].
pub struct AccessResolver<'a> {
    cache: &'a dyn AccessCacheStore,
    prompter: &'a dyn Prompter,
    defaults: AccessDefaults,
}

impl<'a> AccessResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(
        cache: &'a dyn AccessCacheStore,
        prompter: &'a dyn Prompter,
        defaults: AccessDefaults,
    ) -> Self {
        Self {
            cache,
            prompter,
            defaults,
        }
    }

    /// Resolves coordinates of a cluster that should already exist.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when a coordinate is missing or invalid.
    pub fn resolve_existing(
        &self,
        overrides: &AccessOverrides,
    ) -> Result<AccessConfig, AccessError> {
        let candidates = self.cached_candidates(overrides);
        let sole = match candidates.as_slice() {
            [only] => Some(only),
            _ => None,
        };
        if let Some(cached) = sole
            && overrides != &AccessOverrides::from(cached)
        {
            info!(
                cluster = %cached.cluster_name,
                project = %cached.project,
                zone = %cached.zone,
                "using cached cluster coordinates"
            );
        }

        let cluster_name = self.field(
            overrides.cluster_name.as_deref(),
            sole.map(|access| access.cluster_name.as_str()),
            candidates.first().map(|access| access.cluster_name.as_str()),
            &CLUSTER_NAME,
        )?;
        // Prompt defaults follow the cached cluster with the chosen name.
        let seen = candidates
            .iter()
            .find(|access| access.cluster_name == cluster_name)
            .or_else(|| candidates.first());
        let project = self.field(
            overrides.project.as_deref(),
            sole.map(|access| access.project.as_str()),
            self.defaults
                .project
                .as_deref()
                .or_else(|| seen.map(|access| access.project.as_str())),
            &PROJECT,
        )?;
        let zone = self.field(
            overrides.zone.as_deref(),
            sole.map(|access| access.zone.as_str()),
            seen.map(|access| access.zone.as_str()),
            &ZONE,
        )?;
        AccessConfig::new(cluster_name, project, zone)
    }

    /// Resolves the full configuration of a cluster about to be created.
    ///
    /// Coordinates must come from flags, the file, or a prompt. Node shape
    /// values fall back to defaults when the prompter refuses.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when a coordinate is missing or the result
    /// fails validation.
    pub fn resolve_new(
        &self,
        overrides: &AccessOverrides,
        file: &ClusterConfigFile,
    ) -> Result<ClusterConfig, AccessError> {
        let merged = overrides.or_file(file);
        let cluster_name = self.field(merged.cluster_name.as_deref(), None, None, &CLUSTER_NAME)?;
        let project = self.field(
            merged.project.as_deref(),
            None,
            self.defaults.project.as_deref(),
            &PROJECT,
        )?;
        let zone = self.field(merged.zone.as_deref(), None, None, &ZONE)?;
        let access = AccessConfig::new(cluster_name, project, zone)?;

        let instance_type = match &file.instance_type {
            Some(value) => value.clone(),
            None => self.optional("worker instance type", DEFAULT_INSTANCE_TYPE)?,
        };
        let min_instances = match file.min_instances {
            Some(value) => value,
            None => self.optional_count("minimum worker instances", DEFAULT_MIN_INSTANCES)?,
        };
        let max_instances = match file.max_instances {
            Some(value) => value,
            None => self.optional_count("maximum worker instances", DEFAULT_MAX_INSTANCES)?,
        };

        let config = ClusterConfig {
            access,
            instance_type,
            min_instances,
            max_instances,
            accelerator_type: file.accelerator_type.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Cached entries consistent with the explicit values. Cache failures
    /// only cost convenience, so they are logged and ignored.
    fn cached_candidates(&self, overrides: &AccessOverrides) -> Vec<AccessConfig> {
        match self.cache.load_all() {
            Ok(entries) => entries
                .into_iter()
                .filter(|access| overrides.matches(access))
                .collect(),
            Err(err) => {
                warn!(error = %err, "failed to read the access cache");
                Vec::new()
            }
        }
    }

    fn field(
        &self,
        explicit: Option<&str>,
        cached: Option<&str>,
        suggestion: Option<&str>,
        field: &Field,
    ) -> Result<String, AccessError> {
        if let Some(value) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
            return Ok(value.to_owned());
        }
        if let Some(value) = cached {
            return Ok(value.to_owned());
        }
        match self.prompter.input(field.label, suggestion) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
            Ok(_) | Err(PromptError::Disallowed { .. }) => Err(AccessError::MissingField {
                field: field.label,
                flag: field.flag,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn optional(&self, label: &str, default: &str) -> Result<String, AccessError> {
        match self.prompter.input(label, Some(default)) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
            Ok(_) | Err(PromptError::Disallowed { .. }) => {
                debug!(field = label, value = default, "using default");
                Ok(default.to_owned())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn optional_count(&self, label: &str, default: u32) -> Result<u32, AccessError> {
        let raw = self.optional(label, &default.to_string())?;
        raw.parse().map_err(|_| {
            AccessError::invalid(label, format!("`{raw}` is not a non-negative whole number"))
        })
    }
}
