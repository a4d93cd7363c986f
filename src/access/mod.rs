//! Cluster access coordinates and the shape of a new cluster.
//!
//! An [`AccessConfig`] names one cluster inside one project and zone; it is
//! all the information needed to find the cluster again. A [`ClusterConfig`]
//! extends it with the node shape used when the cluster is created.

mod cache;
mod error;
mod resolver;

#[cfg(test)]
mod tests;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::bucket::BucketName;
use crate::provider::ClusterHandle;
use crate::store;

pub use cache::{AccessCache, AccessCacheStore, cache_file_name};
pub use error::AccessError;
pub use resolver::{AccessDefaults, AccessResolver};

/// Longest cluster name accepted by the managed Kubernetes service.
pub const MAX_CLUSTER_NAME_LEN: usize = 40;
/// Machine type used for worker nodes when none is configured.
pub const DEFAULT_INSTANCE_TYPE: &str = "n1-standard-2";
/// Worker autoscaling floor used when none is configured.
pub const DEFAULT_MIN_INSTANCES: u32 = 1;
/// Worker autoscaling ceiling used when none is configured.
pub const DEFAULT_MAX_INSTANCES: u32 = 5;

/// Coordinates identifying an existing or intended cluster.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Cluster name, unique within the project and zone.
    pub cluster_name: String,
    /// Cloud project (account) that owns the cluster.
    pub project: String,
    /// Zone the cluster runs in, for example `us-central1-a`.
    pub zone: String,
}

impl AccessConfig {
    /// Builds and validates access coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidField`] when any coordinate is
    /// malformed.
    pub fn new(
        cluster_name: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self, AccessError> {
        let config = Self {
            cluster_name: cluster_name.into().trim().to_owned(),
            project: project.into().trim().to_owned(),
            zone: zone.into().trim().to_owned(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the coordinates against the provider's naming rules.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidField`] describing the first problem.
    pub fn validate(&self) -> Result<(), AccessError> {
        validate_cluster_name(&self.cluster_name)?;
        if self.project.is_empty() {
            return Err(AccessError::invalid("project", "must not be empty"));
        }
        if self.zone.is_empty() {
            return Err(AccessError::invalid("zone", "must not be empty"));
        }
        Ok(())
    }

    /// Region containing the zone (`us-central1-a` lives in `us-central1`).
    /// A zone without a region part is used as is.
    #[must_use]
    pub fn region(&self) -> &str {
        region_of(&self.zone).unwrap_or(&self.zone)
    }

    /// Name of the state bucket paired with this cluster.
    #[must_use]
    pub fn bucket_name(&self) -> BucketName {
        BucketName::derive(&self.cluster_name, &self.project, &self.zone)
    }

    /// Provider handle for this cluster.
    #[must_use]
    pub fn handle(&self) -> ClusterHandle {
        ClusterHandle::new(&self.project, &self.zone, &self.cluster_name)
    }
}

/// Full description of a cluster to create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterConfig {
    /// Where the cluster lives.
    pub access: AccessConfig,
    /// Machine type for worker nodes.
    pub instance_type: String,
    /// Autoscaling floor for the worker pool; also its initial size.
    pub min_instances: u32,
    /// Autoscaling ceiling for the worker pool.
    pub max_instances: u32,
    /// Optional accelerator attached to each worker node.
    pub accelerator_type: Option<String>,
}

impl ClusterConfig {
    /// Checks the node shape in addition to the access coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidField`] describing the first problem.
    pub fn validate(&self) -> Result<(), AccessError> {
        self.access.validate()?;
        if self.instance_type.trim().is_empty() {
            return Err(AccessError::invalid("instance_type", "must not be empty"));
        }
        if self.max_instances == 0 {
            return Err(AccessError::invalid("max_instances", "must be at least 1"));
        }
        if self.min_instances > self.max_instances {
            return Err(AccessError::invalid(
                "min_instances",
                format!(
                    "{} exceeds max_instances ({})",
                    self.min_instances, self.max_instances
                ),
            ));
        }
        if self
            .accelerator_type
            .as_deref()
            .is_some_and(|accelerator| accelerator.trim().is_empty())
        {
            return Err(AccessError::invalid(
                "accelerator_type",
                "must not be blank when present",
            ));
        }
        Ok(())
    }
}

/// Values supplied on the command line. Anything left `None` is taken from
/// the cluster configuration file, the access cache, or a prompt.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AccessOverrides {
    /// `--name`.
    pub cluster_name: Option<String>,
    /// `--project`.
    pub project: Option<String>,
    /// `--zone`.
    pub zone: Option<String>,
}

impl AccessOverrides {
    /// Fills gaps from `file`. Flags win over the file.
    #[must_use]
    pub fn or_file(&self, file: &ClusterConfigFile) -> Self {
        Self {
            cluster_name: self.cluster_name.clone().or_else(|| file.cluster_name.clone()),
            project: self.project.clone().or_else(|| file.project.clone()),
            zone: self.zone.clone().or_else(|| file.zone.clone()),
        }
    }

    /// Returns `true` when `access` agrees with every provided value.
    #[must_use]
    pub fn matches(&self, access: &AccessConfig) -> bool {
        let agrees = |wanted: Option<&String>, actual: &str| wanted.is_none_or(|value| value == actual);
        agrees(self.cluster_name.as_ref(), &access.cluster_name)
            && agrees(self.project.as_ref(), &access.project)
            && agrees(self.zone.as_ref(), &access.zone)
    }
}

impl From<&AccessConfig> for AccessOverrides {
    fn from(access: &AccessConfig) -> Self {
        Self {
            cluster_name: Some(access.cluster_name.clone()),
            project: Some(access.project.clone()),
            zone: Some(access.zone.clone()),
        }
    }
}

/// Cluster configuration file passed with `--config`.
///
/// ```toml
/// cluster_name = "ml"
/// project = "my-project"
/// zone = "us-central1-a"
/// instance_type = "n1-standard-4"
/// min_instances = 1
/// max_instances = 5
/// accelerator_type = "nvidia-tesla-t4"
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfigFile {
    /// Cluster name.
    pub cluster_name: Option<String>,
    /// Cloud project.
    pub project: Option<String>,
    /// Zone.
    pub zone: Option<String>,
    /// Worker machine type.
    pub instance_type: Option<String>,
    /// Worker autoscaling floor.
    pub min_instances: Option<u32>,
    /// Worker autoscaling ceiling.
    pub max_instances: Option<u32>,
    /// Worker accelerator.
    pub accelerator_type: Option<String>,
}

impl ClusterConfigFile {
    /// Loads a cluster configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::ConfigFile`] when the file is missing or
    /// cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, AccessError> {
        store::read_toml(path)
            .map_err(|err| AccessError::ConfigFile {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
            .ok_or_else(|| AccessError::ConfigFile {
                path: path.to_path_buf(),
                message: String::from("file not found or empty"),
            })
    }
}

fn validate_cluster_name(name: &str) -> Result<(), AccessError> {
    if name.is_empty() {
        return Err(AccessError::invalid("cluster name", "must not be empty"));
    }
    if name.chars().count() > MAX_CLUSTER_NAME_LEN {
        return Err(AccessError::invalid(
            "cluster name",
            format!("must be at most {MAX_CLUSTER_NAME_LEN} characters"),
        ));
    }
    if !name.starts_with(|ch: char| ch.is_ascii_lowercase()) {
        return Err(AccessError::invalid(
            "cluster name",
            "must start with a lowercase letter",
        ));
    }
    if name.ends_with('-') {
        return Err(AccessError::invalid("cluster name", "must not end with a hyphen"));
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
    {
        return Err(AccessError::invalid(
            "cluster name",
            "may only contain lowercase letters, digits, and hyphens",
        ));
    }
    Ok(())
}

/// Strips the trailing zone letter: `us-central1-a` becomes `us-central1`.
fn region_of(zone: &str) -> Option<&str> {
    let (region, suffix) = zone.rsplit_once('-')?;
    let valid = !region.is_empty()
        && region.contains('-')
        && !suffix.is_empty()
        && suffix.chars().all(|ch| ch.is_ascii_lowercase());
    valid.then_some(region)
}
