//! Core library for the gantry cluster lifecycle tool.
//!
//! The crate provisions a GKE cluster and its state bucket, installs the
//! operator with a containerised installer, discovers the operator's
//! endpoint, and keeps named CLI environments pointing at it. Every external
//! system sits behind a trait so the lifecycle can be driven by the doubles
//! in [`test_support`].

pub mod access;
pub mod bucket;
pub mod config;
pub mod context;
pub mod discovery;
pub mod installer;
pub mod lifecycle;
pub mod operator;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod report;
pub mod runner;
pub mod store;
pub mod test_support;

pub use access::{
    AccessCache, AccessCacheStore, AccessConfig, AccessDefaults, AccessError, AccessOverrides,
    AccessResolver, ClusterConfig, ClusterConfigFile,
};
pub use bucket::BucketName;
pub use config::{GantrySettings, SettingsError};
pub use context::CommandContext;
pub use discovery::{DiscoveryError, EndpointResolver, KubeServiceDirectory, ServiceDirectory};
pub use installer::{ContainerRuntime, DockerRuntime, InstallerError, InstallerRunner};
pub use lifecycle::{
    CleanupReport, CleanupTask, Collaborators, DownOutcome, InfoOutcome, LifecycleError,
    LifecycleOrchestrator, LifecycleSettings, TaskStatus, UpOutcome,
};
pub use operator::{HttpOperatorClient, OperatorClient, OperatorError, OperatorInfo};
pub use prompt::{NoPrompt, PromptError, Prompter, TerminalPrompter};
pub use provider::gcp::{GcloudTokenSource, GcpEndpoints, GcpProvider, ServiceAccountKey};
pub use provider::{
    ClusterHandle, ClusterProvider, ClusterStatus, PollSettings, ProviderError,
    ResourceProvisioner, StorageProvider,
};
pub use registry::{FileRegistry, ReconcileOutcome, Reconciler, RegistryError, RegistryStore};
pub use report::{Reporter, TerminalReporter};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, RunnerError};
pub use store::StoreError;
