//! Node pool layout for new clusters.
//!
//! Every cluster gets a small untainted control pool for the operator and
//! an autoscaling worker pool that only accepts workload pods.

use std::collections::BTreeMap;

use crate::access::ClusterConfig;

use super::ClusterHandle;

/// Name of the pool that hosts the operator.
pub const CONTROL_POOL_NAME: &str = "gantry-operator";
/// Machine type of the control pool.
pub const CONTROL_MACHINE_TYPE: &str = "n1-standard-2";
/// Name of the autoscaling worker pool.
pub const WORKER_POOL_NAME: &str = "gantry-worker-on-demand";
/// Label and taint applied to worker nodes.
pub const WORKLOAD_LABEL: (&str, &str) = ("workload", "true");
/// Label applied to worker nodes that carry an accelerator.
pub const GPU_LABEL: (&str, &str) = ("nvidia.com/gpu", "present");
/// Initial control plane version requested at creation.
pub const CLUSTER_VERSION: &str = "1.17";

/// Scheduling effect of a node taint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaintEffect {
    /// Pods without a matching toleration are not scheduled.
    NoSchedule,
}

/// Taint applied to every node of a pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeTaint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    pub value: String,
    /// Scheduling effect.
    pub effect: TaintEffect,
}

/// Autoscaling bounds of a pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Autoscaling {
    /// Minimum node count.
    pub min: u32,
    /// Maximum node count.
    pub max: u32,
}

/// Accelerator attached to each node of a pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Accelerator {
    /// Provider accelerator type.
    pub accelerator_type: String,
    /// Accelerators per node.
    pub count: u32,
}

/// One node pool of a new cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodePoolSpec {
    /// Pool name.
    pub name: String,
    /// Machine type of every node.
    pub machine_type: String,
    /// Nodes created up front.
    pub initial_node_count: u32,
    /// Autoscaling bounds, when the pool scales.
    pub autoscaling: Option<Autoscaling>,
    /// Kubernetes labels applied to every node.
    pub labels: BTreeMap<String, String>,
    /// Taints applied to every node.
    pub taints: Vec<NodeTaint>,
    /// Accelerator attached to every node.
    pub accelerator: Option<Accelerator>,
}

/// Provider-neutral description of a cluster to create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterSpec {
    /// Where the cluster will live.
    pub handle: ClusterHandle,
    /// Control plane version.
    pub initial_version: String,
    /// Node pools in creation order.
    pub node_pools: Vec<NodePoolSpec>,
}

impl ClusterSpec {
    /// Lays out the control and worker pools for `config`.
    #[must_use]
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            handle: config.access.handle(),
            initial_version: CLUSTER_VERSION.to_owned(),
            node_pools: vec![control_pool(), worker_pool(config)],
        }
    }

    /// Looks up a pool by name.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<&NodePoolSpec> {
        self.node_pools.iter().find(|pool| pool.name == name)
    }
}

fn control_pool() -> NodePoolSpec {
    NodePoolSpec {
        name: CONTROL_POOL_NAME.to_owned(),
        machine_type: CONTROL_MACHINE_TYPE.to_owned(),
        initial_node_count: 1,
        autoscaling: None,
        labels: BTreeMap::new(),
        taints: Vec::new(),
        accelerator: None,
    }
}

fn worker_pool(config: &ClusterConfig) -> NodePoolSpec {
    let (workload_key, workload_value) = WORKLOAD_LABEL;
    let mut labels = BTreeMap::from([(workload_key.to_owned(), workload_value.to_owned())]);
    let accelerator = config.accelerator_type.as_ref().map(|accelerator_type| {
        let (gpu_key, gpu_value) = GPU_LABEL;
        labels.insert(gpu_key.to_owned(), gpu_value.to_owned());
        Accelerator {
            accelerator_type: accelerator_type.clone(),
            count: 1,
        }
    });

    NodePoolSpec {
        name: WORKER_POOL_NAME.to_owned(),
        machine_type: config.instance_type.clone(),
        initial_node_count: config.min_instances,
        autoscaling: Some(Autoscaling {
            min: config.min_instances,
            max: config.max_instances,
        }),
        labels,
        taints: vec![NodeTaint {
            key: workload_key.to_owned(),
            value: workload_value.to_owned(),
            effect: TaintEffect::NoSchedule,
        }],
        accelerator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessConfig;
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> ClusterConfig {
        ClusterConfig {
            access: AccessConfig::new("c1", "p1", "us-central1-a")
                .unwrap_or_else(|err| panic!("access: {err}")),
            instance_type: String::from("n1-standard-8"),
            min_instances: 2,
            max_instances: 6,
            accelerator_type: None,
        }
    }

    #[rstest]
    fn control_pool_is_single_untainted_node(config: ClusterConfig) {
        let spec = ClusterSpec::from_config(&config);
        let pool = spec
            .pool(CONTROL_POOL_NAME)
            .unwrap_or_else(|| panic!("control pool missing"));

        assert_eq!(pool.machine_type, CONTROL_MACHINE_TYPE);
        assert_eq!(pool.initial_node_count, 1);
        assert!(pool.taints.is_empty());
        assert!(pool.autoscaling.is_none());
    }

    #[rstest]
    fn worker_pool_is_tainted_and_scales_from_minimum(config: ClusterConfig) {
        let spec = ClusterSpec::from_config(&config);
        let pool = spec
            .pool(WORKER_POOL_NAME)
            .unwrap_or_else(|| panic!("worker pool missing"));

        assert_eq!(pool.machine_type, "n1-standard-8");
        assert_eq!(pool.initial_node_count, 2);
        assert_eq!(pool.autoscaling, Some(Autoscaling { min: 2, max: 6 }));
        assert_eq!(pool.labels.get("workload").map(String::as_str), Some("true"));
        assert!(!pool.labels.contains_key(GPU_LABEL.0));
        assert_eq!(
            pool.taints,
            vec![NodeTaint {
                key: String::from("workload"),
                value: String::from("true"),
                effect: TaintEffect::NoSchedule,
            }]
        );
        assert!(pool.accelerator.is_none());
    }

    #[rstest]
    fn accelerator_adds_gpu_label(mut config: ClusterConfig) {
        config.accelerator_type = Some(String::from("nvidia-tesla-t4"));
        let spec = ClusterSpec::from_config(&config);
        let pool = spec
            .pool(WORKER_POOL_NAME)
            .unwrap_or_else(|| panic!("worker pool missing"));

        assert_eq!(pool.labels.get(GPU_LABEL.0).map(String::as_str), Some(GPU_LABEL.1));
        assert_eq!(
            pool.accelerator,
            Some(Accelerator {
                accelerator_type: String::from("nvidia-tesla-t4"),
                count: 1,
            })
        );
    }
}
