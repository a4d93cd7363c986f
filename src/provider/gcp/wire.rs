//! JSON bodies exchanged with the GKE and Cloud Storage REST APIs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::{ClusterSnapshot, ClusterSpec, ClusterStatus, NodePoolSpec, TaintEffect};

/// OAuth scopes granted to every node.
pub(super) const NODE_OAUTH_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/compute",
    "https://www.googleapis.com/auth/devstorage.read_only",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateClusterRequest {
    cluster: ClusterBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterBody {
    name: String,
    initial_cluster_version: String,
    node_pools: Vec<NodePoolBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodePoolBody {
    name: String,
    initial_node_count: u32,
    config: NodeConfigBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    autoscaling: Option<AutoscalingBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeConfigBody {
    machine_type: String,
    oauth_scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_account: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    taints: Vec<TaintBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accelerators: Vec<AcceleratorBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaintBody {
    key: String,
    value: String,
    effect: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutoscalingBody {
    enabled: bool,
    min_node_count: u32,
    max_node_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceleratorBody {
    accelerator_count: String,
    accelerator_type: String,
}

impl CreateClusterRequest {
    pub(super) fn from_spec(spec: &ClusterSpec, service_account: Option<&str>) -> Self {
        Self {
            cluster: ClusterBody {
                name: spec.handle.name.clone(),
                initial_cluster_version: spec.initial_version.clone(),
                node_pools: spec
                    .node_pools
                    .iter()
                    .map(|pool| NodePoolBody::from_spec(pool, service_account))
                    .collect(),
            },
        }
    }
}

impl NodePoolBody {
    fn from_spec(pool: &NodePoolSpec, service_account: Option<&str>) -> Self {
        Self {
            name: pool.name.clone(),
            initial_node_count: pool.initial_node_count,
            config: NodeConfigBody {
                machine_type: pool.machine_type.clone(),
                oauth_scopes: NODE_OAUTH_SCOPES.map(str::to_owned).to_vec(),
                service_account: service_account.map(str::to_owned),
                labels: pool.labels.clone(),
                taints: pool
                    .taints
                    .iter()
                    .map(|taint| TaintBody {
                        key: taint.key.clone(),
                        value: taint.value.clone(),
                        effect: match taint.effect {
                            TaintEffect::NoSchedule => "NO_SCHEDULE",
                        },
                    })
                    .collect(),
                accelerators: pool
                    .accelerator
                    .iter()
                    .map(|accelerator| AcceleratorBody {
                        accelerator_count: accelerator.count.to_string(),
                        accelerator_type: accelerator.accelerator_type.clone(),
                    })
                    .collect(),
            },
            autoscaling: pool.autoscaling.map(|bounds| AutoscalingBody {
                enabled: true,
                min_node_count: bounds.min,
                max_node_count: bounds.max,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ClusterResource {
    #[serde(default)]
    status: String,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    master_auth: Option<MasterAuth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasterAuth {
    #[serde(default)]
    cluster_ca_certificate: Option<String>,
}

impl From<ClusterResource> for ClusterSnapshot {
    fn from(resource: ClusterResource) -> Self {
        let non_empty = |value: Option<String>| value.filter(|text| !text.is_empty());
        Self {
            status: ClusterStatus::from_provider(&resource.status),
            status_message: resource.status_message,
            endpoint: non_empty(resource.endpoint),
            ca_certificate: non_empty(
                resource
                    .master_auth
                    .and_then(|auth| auth.cluster_ca_certificate),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateBucketRequest<'a> {
    pub(super) name: &'a str,
    pub(super) location: &'a str,
    pub(super) iam_configuration: IamConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IamConfiguration {
    pub(super) uniform_bucket_level_access: UniformAccess,
}

#[derive(Debug, Serialize)]
pub(super) struct UniformAccess {
    pub(super) enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ObjectList {
    #[serde(default)]
    pub(super) items: Vec<ObjectItem>,
    #[serde(default)]
    pub(super) next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ObjectItem {
    pub(super) name: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Extracts `error.message` from a Google API error body, falling back to
/// the raw body.
pub(super) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}
