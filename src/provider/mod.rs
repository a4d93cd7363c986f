//! Cloud provider abstraction for clusters and object storage.
//!
//! The lifecycle only talks to the traits in this module. The Google Cloud
//! implementation lives in [`gcp`]; tests substitute scripted doubles.

mod error;
pub mod gcp;
mod node_pools;
mod poll;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::access::ClusterConfig;
use crate::bucket::BucketName;

pub use error::ProviderError;
pub use node_pools::{
    Accelerator, Autoscaling, CLUSTER_VERSION, CONTROL_MACHINE_TYPE, CONTROL_POOL_NAME, ClusterSpec,
    GPU_LABEL, NodePoolSpec, NodeTaint, TaintEffect, WORKER_POOL_NAME, WORKLOAD_LABEL,
};
pub use poll::{PollSettings, wait_until_provisioned};

/// Boxed future returned by provider and collaborator traits.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Identifies a cluster as `projects/{project}/locations/{zone}/clusters/{name}`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClusterHandle {
    /// Owning project.
    pub project: String,
    /// Zone the cluster runs in.
    pub zone: String,
    /// Cluster name.
    pub name: String,
}

impl ClusterHandle {
    /// Creates a handle from its parts.
    #[must_use]
    pub fn new(project: &str, zone: &str, name: &str) -> Self {
        Self {
            project: project.to_owned(),
            zone: zone.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Resource path of the location containing the cluster.
    #[must_use]
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.zone)
    }
}

impl fmt::Display for ClusterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/clusters/{}", self.parent(), self.name)
    }
}

/// Lifecycle status reported for a cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClusterStatus {
    /// Creation is still in progress.
    Provisioning,
    /// The cluster is ready.
    Running,
    /// Creation failed.
    Error,
    /// Any other provider status, kept verbatim.
    Other(String),
}

impl ClusterStatus {
    /// Maps a provider status string.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "PROVISIONING" => Self::Provisioning,
            "RUNNING" => Self::Running,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => f.write_str("PROVISIONING"),
            Self::Running => f.write_str("RUNNING"),
            Self::Error => f.write_str("ERROR"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Point-in-time view of a cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterSnapshot {
    /// Current status.
    pub status: ClusterStatus,
    /// Provider explanation accompanying the status, often empty.
    pub status_message: String,
    /// Control plane address once known.
    pub endpoint: Option<String>,
    /// Base64 PEM bundle of the control plane CA once known.
    pub ca_certificate: Option<String>,
}

/// Short-lived administrative credentials for a cluster.
#[derive(Clone, Eq, PartialEq)]
pub struct ClusterCredentials {
    /// API server URL.
    pub server: String,
    /// Base64 PEM bundle of the API server CA.
    pub ca_certificate: String,
    /// Bearer token.
    pub token: String,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredentials")
            .field("server", &self.server)
            .field("ca_certificate", &"<redacted>")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ClusterCredentials {
    /// Renders a single-context kubeconfig document for these credentials.
    #[must_use]
    pub fn to_kubeconfig_yaml(&self) -> String {
        format!(
            "apiVersion: v1\n\
             kind: Config\n\
             clusters:\n\
             - name: gantry\n  \
               cluster:\n    \
                 server: {server}\n    \
                 certificate-authority-data: {ca}\n\
             users:\n\
             - name: gantry\n  \
               user:\n    \
                 token: {token}\n\
             contexts:\n\
             - name: gantry\n  \
               context:\n    \
                 cluster: gantry\n    \
                 user: gantry\n\
             current-context: gantry\n",
            server = self.server,
            ca = self.ca_certificate,
            token = self.token,
        )
    }
}

/// Request to create a storage bucket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BucketSpec {
    /// Bucket name.
    pub name: BucketName,
    /// Project billed for the bucket.
    pub project: String,
    /// Region the bucket lives in.
    pub region: String,
}

/// Whether [`StorageProvider::create_bucket`] made a new bucket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BucketState {
    /// The bucket was created by this call.
    Created,
    /// A bucket of that name already existed and is readable by this
    /// account.
    AlreadyOwned,
}

/// Operations on managed Kubernetes clusters.
pub trait ClusterProvider: Send + Sync {
    /// Submits a cluster creation request and returns without waiting.
    fn create_cluster<'a>(
        &'a self,
        spec: &'a ClusterSpec,
    ) -> BackendFuture<'a, ClusterHandle, ProviderError>;

    /// Reads the current state of a cluster.
    fn get_cluster<'a>(
        &'a self,
        handle: &'a ClusterHandle,
    ) -> BackendFuture<'a, ClusterSnapshot, ProviderError>;

    /// Submits a cluster deletion request.
    fn delete_cluster<'a>(
        &'a self,
        handle: &'a ClusterHandle,
    ) -> BackendFuture<'a, (), ProviderError>;

    /// Derives administrative credentials from a snapshot.
    fn derive_credentials<'a>(
        &'a self,
        snapshot: &'a ClusterSnapshot,
    ) -> BackendFuture<'a, ClusterCredentials, ProviderError>;

    /// Web console page where the user can inspect the cluster.
    fn console_url(&self, handle: &ClusterHandle) -> String;
}

/// Operations on object storage buckets.
pub trait StorageProvider: Send + Sync {
    /// Creates a bucket. A bucket of the same name that this account can
    /// already read counts as success.
    fn create_bucket<'a>(
        &'a self,
        spec: &'a BucketSpec,
    ) -> BackendFuture<'a, BucketState, ProviderError>;

    /// Deletes a bucket together with its contents.
    fn delete_bucket<'a>(&'a self, name: &'a BucketName) -> BackendFuture<'a, (), ProviderError>;
}

/// Creates and destroys the cloud resources a deployment needs.
pub struct ResourceProvisioner<'a> {
    clusters: &'a dyn ClusterProvider,
    storage: &'a dyn StorageProvider,
    poll: PollSettings,
}

impl<'a> ResourceProvisioner<'a> {
    /// Creates a provisioner over the given providers.
    #[must_use]
    pub const fn new(
        clusters: &'a dyn ClusterProvider,
        storage: &'a dyn StorageProvider,
        poll: PollSettings,
    ) -> Self {
        Self {
            clusters,
            storage,
            poll,
        }
    }

    /// Cluster provider in use.
    #[must_use]
    pub fn clusters(&self) -> &'a dyn ClusterProvider {
        self.clusters
    }

    /// Creates the state bucket.
    ///
    /// # Errors
    ///
    /// Propagates the storage provider's error.
    pub async fn create_bucket(&self, spec: &BucketSpec) -> Result<BucketState, ProviderError> {
        info!(bucket = %spec.name, region = %spec.region, "creating state bucket");
        self.storage.create_bucket(spec).await
    }

    /// Deletes the state bucket and its contents.
    ///
    /// # Errors
    ///
    /// Propagates the storage provider's error.
    pub async fn delete_bucket(&self, name: &BucketName) -> Result<(), ProviderError> {
        info!(bucket = %name, "deleting state bucket");
        self.storage.delete_bucket(name).await
    }

    /// Creates a cluster with the standard node pools and waits until it
    /// leaves the provisioning state.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::TerminalState`] when the provider reports
    /// an error state, [`ProviderError::Cancelled`] when `cancel` fires, and
    /// [`ProviderError::ProvisionTimeout`] when a configured bound elapses.
    pub async fn create_cluster(
        &self,
        config: &ClusterConfig,
        cancel: &CancellationToken,
    ) -> Result<ClusterHandle, ProviderError> {
        let spec = ClusterSpec::from_config(config);
        info!(cluster = %spec.handle, "creating cluster");
        let handle = self.clusters.create_cluster(&spec).await?;
        wait_until_provisioned(self.clusters, &handle, &self.poll, cancel).await?;
        info!(cluster = %handle, "cluster is running");
        Ok(handle)
    }

    /// Submits cluster deletion.
    ///
    /// # Errors
    ///
    /// Propagates the cluster provider's error.
    pub async fn delete_cluster(&self, handle: &ClusterHandle) -> Result<(), ProviderError> {
        info!(cluster = %handle, "deleting cluster");
        self.clusters.delete_cluster(handle).await
    }
}
