//! Service lookups through the Kubernetes API.

use k8s_openapi::api::core::v1::Service;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};

use crate::provider::{BackendFuture, ClusterCredentials};

use super::{DiscoveryError, ServiceDirectory};

/// [`ServiceDirectory`] backed by a `kube` client built from cluster
/// credentials on each lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct KubeServiceDirectory;

async fn client_for(credentials: &ClusterCredentials) -> Result<Client, DiscoveryError> {
    let transport = |err: &dyn std::fmt::Display| DiscoveryError::Transport(err.to_string());
    let kubeconfig = Kubeconfig::from_yaml(&credentials.to_kubeconfig_yaml())
        .map_err(|err| transport(&err))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|err| transport(&err))?;
    Client::try_from(config).map_err(|err| transport(&err))
}

impl ServiceDirectory for KubeServiceDirectory {
    fn load_balancer_ips<'a>(
        &'a self,
        credentials: &'a ClusterCredentials,
        namespace: &'a str,
        service: &'a str,
    ) -> BackendFuture<'a, Option<Vec<String>>, DiscoveryError> {
        Box::pin(async move {
            let client = client_for(credentials).await?;
            let services: Api<Service> = Api::namespaced(client, namespace);
            let found = services
                .get_opt(service)
                .await
                .map_err(|err| DiscoveryError::Transport(err.to_string()))?;
            Ok(found.map(|svc| {
                svc.status
                    .and_then(|status| status.load_balancer)
                    .and_then(|balancer| balancer.ingress)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|ingress| ingress.ip.unwrap_or_default())
                    .collect()
            }))
        })
    }
}
