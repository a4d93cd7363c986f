//! Scripted cluster and storage provider.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::bucket::BucketName;
use crate::provider::{
    BackendFuture, BucketSpec, BucketState, ClusterCredentials, ClusterHandle, ClusterProvider,
    ClusterSnapshot, ClusterSpec, ClusterStatus, ProviderError, StorageProvider,
};

use super::locked;

/// Provider operation, used to script failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CloudOp {
    /// [`StorageProvider::create_bucket`].
    CreateBucket,
    /// [`StorageProvider::delete_bucket`].
    DeleteBucket,
    /// [`ClusterProvider::create_cluster`].
    CreateCluster,
    /// [`ClusterProvider::get_cluster`].
    GetCluster,
    /// [`ClusterProvider::delete_cluster`].
    DeleteCluster,
    /// [`ClusterProvider::derive_credentials`].
    DeriveCredentials,
}

/// A call received by [`FakeCloud`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CloudCall {
    /// Bucket creation.
    CreateBucket(BucketSpec),
    /// Bucket deletion.
    DeleteBucket(BucketName),
    /// Cluster creation.
    CreateCluster(ClusterSpec),
    /// Cluster status read.
    GetCluster(ClusterHandle),
    /// Cluster deletion.
    DeleteCluster(ClusterHandle),
    /// Credential derivation.
    DeriveCredentials,
}

impl CloudCall {
    /// Operation this call belongs to.
    #[must_use]
    pub const fn op(&self) -> CloudOp {
        match self {
            Self::CreateBucket(_) => CloudOp::CreateBucket,
            Self::DeleteBucket(_) => CloudOp::DeleteBucket,
            Self::CreateCluster(_) => CloudOp::CreateCluster,
            Self::GetCluster(_) => CloudOp::GetCluster,
            Self::DeleteCluster(_) => CloudOp::DeleteCluster,
            Self::DeriveCredentials => CloudOp::DeriveCredentials,
        }
    }
}

#[derive(Debug, Default)]
struct CloudState {
    calls: Vec<CloudCall>,
    statuses: VecDeque<ClusterStatus>,
    failures: BTreeMap<CloudOp, ProviderError>,
    bucket_exists: bool,
}

/// Cluster and storage provider answering from a script.
///
/// Status reads pop the scripted statuses and report `RUNNING` once the
/// script is exhausted. Every running snapshot carries a control plane
/// endpoint, so credentials can always be derived unless a failure is
/// scripted for [`CloudOp::DeriveCredentials`].
#[derive(Clone, Debug, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    /// Creates a provider whose clusters are running immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a status for the next read.
    pub fn push_status(&self, status: ClusterStatus) {
        locked(&self.state).statuses.push_back(status);
    }

    /// Makes every call of `op` fail with `error`.
    pub fn fail(&self, op: CloudOp, error: ProviderError) {
        locked(&self.state).failures.insert(op, error);
    }

    /// Makes bucket creation report an existing bucket.
    pub fn bucket_exists(&self) {
        locked(&self.state).bucket_exists = true;
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CloudCall> {
        locked(&self.state).calls.clone()
    }

    /// Operations received so far, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<CloudOp> {
        self.calls().iter().map(CloudCall::op).collect()
    }

    /// Number of calls of `op` received so far.
    #[must_use]
    pub fn count(&self, op: CloudOp) -> usize {
        self.calls().iter().filter(|call| call.op() == op).count()
    }

    fn record(&self, call: CloudCall) -> Result<(), ProviderError> {
        let mut state = locked(&self.state);
        let op = call.op();
        state.calls.push(call);
        state.failures.get(&op).cloned().map_or(Ok(()), Err)
    }
}

impl ClusterProvider for FakeCloud {
    fn create_cluster<'a>(
        &'a self,
        spec: &'a ClusterSpec,
    ) -> BackendFuture<'a, ClusterHandle, ProviderError> {
        let result = self
            .record(CloudCall::CreateCluster(spec.clone()))
            .map(|()| spec.handle.clone());
        Box::pin(async move { result })
    }

    fn get_cluster<'a>(
        &'a self,
        handle: &'a ClusterHandle,
    ) -> BackendFuture<'a, ClusterSnapshot, ProviderError> {
        let result = self.record(CloudCall::GetCluster(handle.clone())).map(|()| {
            let status = locked(&self.state)
                .statuses
                .pop_front()
                .unwrap_or(ClusterStatus::Running);
            let running = status == ClusterStatus::Running;
            ClusterSnapshot {
                status_message: if status == ClusterStatus::Error {
                    String::from("insufficient regional quota")
                } else {
                    String::new()
                },
                status,
                endpoint: running.then(|| String::from("10.0.0.1")),
                ca_certificate: running.then(|| String::from("Q0E=")),
            }
        });
        Box::pin(async move { result })
    }

    fn delete_cluster<'a>(
        &'a self,
        handle: &'a ClusterHandle,
    ) -> BackendFuture<'a, (), ProviderError> {
        let result = self.record(CloudCall::DeleteCluster(handle.clone()));
        Box::pin(async move { result })
    }

    fn derive_credentials<'a>(
        &'a self,
        snapshot: &'a ClusterSnapshot,
    ) -> BackendFuture<'a, ClusterCredentials, ProviderError> {
        let result = self.record(CloudCall::DeriveCredentials).and_then(|()| {
            let server = snapshot
                .endpoint
                .clone()
                .ok_or(ProviderError::MissingClusterField { field: "endpoint" })?;
            Ok(ClusterCredentials {
                server: format!("https://{server}"),
                ca_certificate: snapshot.ca_certificate.clone().unwrap_or_default(),
                token: String::from("fake-token"),
            })
        });
        Box::pin(async move { result })
    }

    fn console_url(&self, handle: &ClusterHandle) -> String {
        format!("https://console.test/{}/{}", handle.zone, handle.name)
    }
}

impl StorageProvider for FakeCloud {
    fn create_bucket<'a>(
        &'a self,
        spec: &'a BucketSpec,
    ) -> BackendFuture<'a, BucketState, ProviderError> {
        let result = self.record(CloudCall::CreateBucket(spec.clone())).map(|()| {
            if locked(&self.state).bucket_exists {
                BucketState::AlreadyOwned
            } else {
                BucketState::Created
            }
        });
        Box::pin(async move { result })
    }

    fn delete_bucket<'a>(&'a self, name: &'a BucketName) -> BackendFuture<'a, (), ProviderError> {
        let result = self.record(CloudCall::DeleteBucket(name.clone()));
        Box::pin(async move { result })
    }
}
