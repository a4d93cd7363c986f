//! Finds the public address of the operator's load balancer.

mod kube_directory;


use thiserror::Error;
use tracing::debug;

use crate::provider::{BackendFuture, ClusterCredentials, ClusterHandle, ClusterProvider};

pub use kube_directory::KubeServiceDirectory;

/// Namespace of the operator's ingress gateway.
pub const OPERATOR_NAMESPACE: &str = "istio-system";
/// Service fronting the operator.
pub const OPERATOR_SERVICE: &str = "ingressgateway-operator";

/// Errors raised while discovering the operator endpoint.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DiscoveryError {
    /// The gateway service does not exist.
    #[error("unable to find the operator load balancer: service {namespace}/{service} does not exist, so the operator may not be installed")]
    NotInstalled {
        /// Namespace searched.
        namespace: String,
        /// Service searched for.
        service: String,
    },
    /// The load balancer exists but has no usable address yet.
    #[error("the operator load balancer {detail}; it may still be starting")]
    NotYetAssigned {
        /// What is missing.
        detail: &'static str,
    },
    /// The cluster or its API could not be queried.
    #[error("failed to query the cluster: {0}")]
    Transport(String),
}

/// Read access to Kubernetes services.
pub trait ServiceDirectory: Send + Sync {
    /// Returns the load balancer ingress IPs of a service, in order, or
    /// `None` when the service does not exist. Entries without an IP are
    /// returned as empty strings.
    fn load_balancer_ips<'a>(
        &'a self,
        credentials: &'a ClusterCredentials,
        namespace: &'a str,
        service: &'a str,
    ) -> BackendFuture<'a, Option<Vec<String>>, DiscoveryError>;
}

/// Resolves the operator URL of a cluster.
pub struct EndpointResolver<'a> {
    clusters: &'a dyn ClusterProvider,
    directory: &'a dyn ServiceDirectory,
}

impl<'a> EndpointResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(
        clusters: &'a dyn ClusterProvider,
        directory: &'a dyn ServiceDirectory,
    ) -> Self {
        Self {
            clusters,
            directory,
        }
    }

    /// Returns the operator's load balancer IP.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotInstalled`] when the gateway service is
    /// absent, [`DiscoveryError::NotYetAssigned`] when it has no address,
    /// and [`DiscoveryError::Transport`] when the cluster cannot be read.
    pub async fn resolve_ip(&self, handle: &ClusterHandle) -> Result<String, DiscoveryError> {
        let transport = |err: crate::provider::ProviderError| DiscoveryError::Transport(err.to_string());
        let snapshot = self.clusters.get_cluster(handle).await.map_err(transport)?;
        let credentials = self
            .clusters
            .derive_credentials(&snapshot)
            .await
            .map_err(transport)?;

        let ips = self
            .directory
            .load_balancer_ips(&credentials, OPERATOR_NAMESPACE, OPERATOR_SERVICE)
            .await?
            .ok_or_else(|| DiscoveryError::NotInstalled {
                namespace: OPERATOR_NAMESPACE.to_owned(),
                service: OPERATOR_SERVICE.to_owned(),
            })?;
        let first = ips.into_iter().next().ok_or(DiscoveryError::NotYetAssigned {
            detail: "has no ingress entries",
        })?;
        if first.trim().is_empty() {
            return Err(DiscoveryError::NotYetAssigned {
                detail: "ingress has no IP address",
            });
        }
        debug!(cluster = %handle, ip = %first, "found operator load balancer");
        Ok(first.trim().to_owned())
    }

    /// Returns the operator URL, `https://<ip>`.
    ///
    /// # Errors
    ///
    /// See [`EndpointResolver::resolve_ip`].
    pub async fn resolve(&self, handle: &ClusterHandle) -> Result<String, DiscoveryError> {
        self.resolve_ip(handle).await.map(|ip| format!("https://{ip}"))
    }
}
