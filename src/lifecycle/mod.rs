//! Orchestrates `up`, `info`, `debug`, and `down`.
//!
//! Each command is a strictly sequential pipeline over the collaborators in
//! [`Collaborators`]. `up` compensates for failures before the cluster is
//! running by deleting the bucket it created; later failures keep the
//! infrastructure and tell the user how to finish. `down` is total: every
//! step except cluster deletion is best-effort and recorded in a
//! [`CleanupReport`].

mod cleanup;
mod error;


use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use shell_escape::unix::escape;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{
    AccessCacheStore, AccessConfig, AccessDefaults, AccessError, AccessResolver, ClusterConfig,
};
use crate::bucket::BucketName;
use crate::context::CommandContext;
use crate::discovery::{EndpointResolver, ServiceDirectory};
use crate::installer::{
    CONTAINER_OUTPUT_DIR, ContainerRuntime, CopyOut, DEBUG_SCRIPT, INFO_SCRIPT, INSTALL_SCRIPT,
    InstallerRunner, ScriptOutput, ScriptTarget, parse_operator_endpoint,
};
use crate::operator::{OperatorClient, OperatorInfo};
use crate::prompt::Prompter;
use crate::provider::{
    BucketSpec, BucketState, ClusterHandle, ClusterProvider, PollSettings, ProviderError,
    ResourceProvisioner, StorageProvider,
};
use crate::registry::{
    LOCAL_ENVIRONMENT, ReconcileOutcome, Reconciler, RegistryStore, Removal,
};
use crate::report::Reporter;

pub use cleanup::{CleanupReport, CleanupTask, TaskResult, TaskStatus};
pub use error::LifecycleError;

/// External systems a command talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Managed Kubernetes provider.
    pub clusters: &'a dyn ClusterProvider,
    /// Object storage provider.
    pub storage: &'a dyn StorageProvider,
    /// Runs installer scripts.
    pub containers: &'a dyn ContainerRuntime,
    /// Reads services inside the cluster.
    pub directory: &'a dyn ServiceDirectory,
    /// Talks to the operator once it is reachable.
    pub operator: &'a dyn OperatorClient,
    /// Named environments.
    pub registry: &'a dyn RegistryStore,
    /// Previously resolved coordinates.
    pub cache: &'a dyn AccessCacheStore,
    /// Asks the user questions.
    pub prompter: &'a dyn Prompter,
    /// Tells the user what happened.
    pub reporter: &'a dyn Reporter,
}

/// Settings shared by every command.
#[derive(Clone, Debug)]
pub struct LifecycleSettings {
    /// Installer image reference.
    pub image: String,
    /// Service account key mounted into installer containers.
    pub credentials_file: Option<Utf8PathBuf>,
    /// Cluster status polling.
    pub poll: PollSettings,
    /// Directory receiving debug bundles.
    pub work_dir: Utf8PathBuf,
    /// Environment configured by `up` when none is named.
    pub default_environment: String,
    /// Suggestions for coordinate prompts.
    pub access_defaults: AccessDefaults,
}

/// Result of a successful `up`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpOutcome {
    /// Cluster that was created.
    pub handle: ClusterHandle,
    /// State bucket that was created or reused.
    pub bucket: BucketName,
    /// Operator URL.
    pub endpoint: String,
    /// Environment pointed at the cluster.
    pub environment: String,
    /// What happened to that environment.
    pub registry: ReconcileOutcome,
}

/// Result of a successful `info`.
#[derive(Clone, Debug, PartialEq)]
pub struct InfoOutcome {
    /// Cluster inspected.
    pub access: AccessConfig,
    /// Operator URL reported by the info script.
    pub endpoint: String,
    /// Status reported by the operator.
    pub info: OperatorInfo,
    /// What happened to the environment named with `--configure-env`.
    pub registry: Option<ReconcileOutcome>,
}

/// Result of a completed `down`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DownOutcome {
    /// Cluster that was deleted.
    pub access: AccessConfig,
    /// Environments removed with it.
    pub removal: Removal,
    /// Outcome of every step.
    pub cleanup: CleanupReport,
}

/// Runs lifecycle commands against a set of collaborators.
pub struct LifecycleOrchestrator<'a> {
    services: Collaborators<'a>,
    settings: LifecycleSettings,
}

impl<'a> LifecycleOrchestrator<'a> {
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(services: Collaborators<'a>, settings: LifecycleSettings) -> Self {
        Self { services, settings }
    }

    /// Creates a cluster, installs the operator, and points an environment
    /// at it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] for the first step that fails. A failure
    /// to create the cluster or install the operator deletes the bucket
    /// created here; the cluster itself is never deleted.
    pub async fn up(
        &self,
        context: &CommandContext,
        cancel: &CancellationToken,
    ) -> Result<UpOutcome, LifecycleError> {
        let environment = context
            .environment
            .clone()
            .unwrap_or_else(|| self.settings.default_environment.clone());
        reject_local(&environment)?;
        self.confirm_environment_overwrite(&environment, context.disallow_prompt)?;
        self.installer()
            .check_runtime()
            .map_err(LifecycleError::Runtime)?;

        let config = self
            .resolver()
            .resolve_new(&context.overrides, &context.cluster_file)?;
        self.remember(&config.access);
        let access = &config.access;
        let bucket = access.bucket_name();

        let bucket_state = self
            .provisioner()
            .create_bucket(&BucketSpec {
                name: bucket.clone(),
                project: access.project.clone(),
                region: access.region().to_owned(),
            })
            .await
            .map_err(|source| LifecycleError::Provisioning {
                message: format!("failed to create the state bucket {bucket}: {source}"),
                source,
            })?;
        self.services
            .reporter
            .line(&format!("state bucket {bucket} is ready"));

        let handle = self.create_cluster(&config, &bucket, bucket_state, cancel).await?;
        self.install(&config, &bucket, bucket_state).await?;

        let remediation = info_command(access, &environment);
        let endpoint = self
            .endpoints()
            .resolve(&handle)
            .await
            .map_err(|source| LifecycleError::Discovery {
                source,
                remediation: remediation.clone(),
            })?;
        self.services
            .reporter
            .line(&format!("the operator is available at {endpoint}"));

        // The overwrite was settled by the pre-flight check.
        let registry = self.configure_environment(&environment, &endpoint, true, remediation)?;
        Ok(UpOutcome {
            handle,
            bucket,
            endpoint,
            environment,
            registry,
        })
    }

    /// Prints the status of an existing cluster, optionally pointing the
    /// environment named with `--configure-env` at it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the info script fails or reports no
    /// endpoint, or when the operator cannot be queried.
    pub async fn info(&self, context: &CommandContext) -> Result<InfoOutcome, LifecycleError> {
        if let Some(name) = &context.environment {
            reject_local(name)?;
        }
        self.installer()
            .check_runtime()
            .map_err(LifecycleError::Runtime)?;
        let access = self.resolver().resolve_existing(&context.access_overrides())?;
        self.remember(&access);

        let output = self.run_existing(INFO_SCRIPT, &access, Vec::new()).await?;
        let endpoint = parse_operator_endpoint(&output.output).ok_or_else(|| {
            LifecycleError::MissingEndpoint {
                output: output.output.clone(),
            }
        })?;
        debug!(endpoint = %endpoint, "info script reported the operator");

        let info = self.services.operator.cluster_info(&endpoint).await?;
        self.services.reporter.line(&info.render());

        let registry = match &context.environment {
            Some(name) => Some(self.configure_environment(
                name,
                &endpoint,
                context.disallow_prompt,
                info_command(&access, name),
            )?),
            None => None,
        };
        Ok(InfoOutcome {
            access,
            endpoint,
            info,
            registry,
        })
    }

    /// Collects a diagnostic bundle from the cluster into the work
    /// directory and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the debug script cannot be run or
    /// exits unsuccessfully.
    pub async fn debug(
        &self,
        context: &CommandContext,
        now: DateTime<Utc>,
    ) -> Result<Utf8PathBuf, LifecycleError> {
        self.installer()
            .check_runtime()
            .map_err(LifecycleError::Runtime)?;
        let access = self.resolver().resolve_existing(&context.access_overrides())?;
        self.remember(&access);

        let file_name = debug_bundle_name(now);
        let container_path = format!("{CONTAINER_OUTPUT_DIR}/{file_name}");
        let command = format!("{DEBUG_SCRIPT} {}", escape(container_path.as_str().into()));
        let copy_out = vec![CopyOut {
            container_path,
            host_dir: self.settings.work_dir.clone(),
        }];
        self.run_existing(&command, &access, copy_out).await?;

        let path = self.settings.work_dir.join(&file_name);
        self.services
            .reporter
            .line(&format!("saved the debug bundle to {path}"));
        Ok(path)
    }

    /// Deletes the cluster and its bucket, then removes environments and
    /// cached coordinates that referred to it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Teardown`] when the cluster cannot be
    /// deleted, after the bucket has been attempted. Other failures are
    /// recorded in the returned report.
    pub async fn down(&self, context: &CommandContext) -> Result<DownOutcome, LifecycleError> {
        if let Some(name) = &context.environment {
            reject_local(name)?;
        }
        let access = self.resolver().resolve_existing(&context.access_overrides())?;
        let handle = access.handle();
        let mut cleanup = CleanupReport::default();

        let endpoint = match self.endpoints().resolve(&handle).await {
            Ok(endpoint) => {
                cleanup.record(CleanupTask::Discovery, TaskStatus::Done);
                Some(endpoint)
            }
            Err(err) => {
                debug!(error = %err, "operator endpoint not found before teardown");
                cleanup.record(CleanupTask::Discovery, TaskStatus::Failed(err.to_string()));
                None
            }
        };

        self.confirm_teardown(&access, context.disallow_prompt)?;
        self.delete_bucket(&access.bucket_name(), &mut cleanup).await;

        if let Err(source) = self.provisioner().delete_cluster(&handle).await {
            cleanup.record(CleanupTask::Cluster, TaskStatus::Failed(source.to_string()));
            return Err(LifecycleError::Teardown {
                cluster: handle.to_string(),
                source,
                report: Box::new(cleanup),
            });
        }
        cleanup.record(CleanupTask::Cluster, TaskStatus::Done);
        self.services.reporter.line(&format!(
            "cluster \"{}\" is being deleted",
            access.cluster_name
        ));

        let removal = self.remove_environments(endpoint.as_deref(), &mut cleanup);
        match self.services.cache.remove(&access) {
            Ok(_) => cleanup.record(CleanupTask::Cache, TaskStatus::Done),
            Err(err) => {
                debug!(error = %err, "failed to remove cached coordinates");
                cleanup.record(CleanupTask::Cache, TaskStatus::Failed(err.to_string()));
            }
        }
        if !cleanup.is_complete() {
            self.services.reporter.warn(&format!(
                "some teardown steps did not complete:\n{}",
                cleanup.to_string().trim_end()
            ));
        }
        Ok(DownOutcome {
            access,
            removal,
            cleanup,
        })
    }

    fn resolver(&self) -> AccessResolver<'a> {
        AccessResolver::new(
            self.services.cache,
            self.services.prompter,
            self.settings.access_defaults.clone(),
        )
    }

    fn provisioner(&self) -> ResourceProvisioner<'a> {
        ResourceProvisioner::new(self.services.clusters, self.services.storage, self.settings.poll)
    }

    fn installer(&self) -> InstallerRunner<'a> {
        InstallerRunner::new(
            self.services.containers,
            self.settings.image.clone(),
            self.settings.credentials_file.clone(),
        )
    }

    fn endpoints(&self) -> EndpointResolver<'a> {
        EndpointResolver::new(self.services.clusters, self.services.directory)
    }

    fn reconciler(&self) -> Reconciler<'a> {
        Reconciler::new(self.services.registry, self.services.prompter)
    }

    fn remember(&self, access: &AccessConfig) {
        if let Err(err) = self.services.cache.store(access) {
            warn!(error = %err, "failed to cache cluster coordinates");
        }
    }

    fn confirm_environment_overwrite(
        &self,
        environment: &str,
        disallow_prompt: bool,
    ) -> Result<(), LifecycleError> {
        let existing = match self.services.registry.get(environment) {
            Ok(existing) => existing,
            Err(err) => {
                warn!(error = %err, "failed to read the environment registry");
                None
            }
        };
        let Some(record) = existing else {
            return Ok(());
        };
        let notice = format!(
            "the environment \"{environment}\" (currently {}) will be pointed at the new cluster once it is created",
            record.operator_endpoint
        );
        if disallow_prompt {
            self.services.reporter.line(&notice);
            return Ok(());
        }
        let proceed = self
            .services
            .prompter
            .confirm(&format!("{notice}; continue?"))
            .map_err(AccessError::from)?;
        if proceed {
            Ok(())
        } else {
            Err(LifecycleError::Aborted)
        }
    }

    async fn create_cluster(
        &self,
        config: &ClusterConfig,
        bucket: &BucketName,
        bucket_state: BucketState,
        cancel: &CancellationToken,
    ) -> Result<ClusterHandle, LifecycleError> {
        let access = &config.access;
        self.services.reporter.line(&format!(
            "creating cluster \"{}\" in {}; this usually takes several minutes",
            access.cluster_name, access.zone
        ));
        match self.provisioner().create_cluster(config, cancel).await {
            Ok(handle) => {
                self.services
                    .reporter
                    .line(&format!("cluster \"{}\" is running", access.cluster_name));
                Ok(handle)
            }
            Err(source) => {
                let rollback = self.roll_back_bucket(bucket, bucket_state).await;
                Err(cluster_failure(access, source, &rollback))
            }
        }
    }

    async fn install(
        &self,
        config: &ClusterConfig,
        bucket: &BucketName,
        bucket_state: BucketState,
    ) -> Result<(), LifecycleError> {
        self.services.reporter.line("installing the operator");
        let target = ScriptTarget::New { config, bucket };
        match self.installer().run(INSTALL_SCRIPT, target, Vec::new()).await {
            Ok(output) if output.succeeded() => Ok(()),
            Ok(output) => {
                let rollback = self.roll_back_bucket(bucket, bucket_state).await;
                Err(LifecycleError::Script {
                    message: format!(
                        "the install script {}; {rollback}; {}",
                        exit_description(output.exit_code),
                        kept_cluster_note(&config.access)
                    ),
                    exit_code: output.exit_code,
                    output: output.output,
                })
            }
            Err(source) => {
                let rollback = self.roll_back_bucket(bucket, bucket_state).await;
                Err(LifecycleError::Installer {
                    message: format!(
                        "failed to run the install script ({rollback}; {})",
                        kept_cluster_note(&config.access)
                    ),
                    source,
                })
            }
        }
    }

    async fn roll_back_bucket(&self, bucket: &BucketName, state: BucketState) -> String {
        if state == BucketState::AlreadyOwned {
            return format!("the state bucket {bucket} existed before this run and was kept");
        }
        match self.provisioner().delete_bucket(bucket).await {
            Ok(()) => {
                info!(bucket = %bucket, "rolled back state bucket");
                format!("the state bucket {bucket} was deleted")
            }
            Err(err) => {
                warn!(bucket = %bucket, error = %err, "failed to roll back state bucket");
                format!(
                    "the state bucket {bucket} could not be deleted ({err}) and must be deleted from the cloud console"
                )
            }
        }
    }

    async fn run_existing(
        &self,
        command: &str,
        access: &AccessConfig,
        copy_out: Vec<CopyOut>,
    ) -> Result<ScriptOutput, LifecycleError> {
        let output = self
            .installer()
            .run(command, ScriptTarget::Existing(access), copy_out)
            .await
            .map_err(|source| LifecycleError::Installer {
                message: format!("failed to run `{command}`"),
                source,
            })?;
        if output.succeeded() {
            return Ok(output);
        }
        Err(LifecycleError::Script {
            message: format!(
                "`{command}` {}:\n{}",
                exit_description(output.exit_code),
                output.output.trim_end()
            ),
            exit_code: output.exit_code,
            output: output.output,
        })
    }

    fn configure_environment(
        &self,
        environment: &str,
        endpoint: &str,
        disallow_prompt: bool,
        remediation: String,
    ) -> Result<ReconcileOutcome, LifecycleError> {
        let outcome = self
            .reconciler()
            .reconcile(environment, endpoint, disallow_prompt)
            .map_err(|source| LifecycleError::Registry {
                source,
                remediation,
            })?;
        if let Some(message) = outcome.describe(environment) {
            self.services.reporter.line(&message);
        }
        Ok(outcome)
    }

    fn confirm_teardown(
        &self,
        access: &AccessConfig,
        disallow_prompt: bool,
    ) -> Result<(), LifecycleError> {
        let notice = format!(
            "cluster \"{}\" in project {} (zone {}) will be deleted along with everything running on it",
            access.cluster_name, access.project, access.zone
        );
        if disallow_prompt {
            self.services.reporter.line(&notice);
            return Ok(());
        }
        let proceed = self
            .services
            .prompter
            .confirm(&format!("{notice}; are you sure?"))
            .map_err(AccessError::from)?;
        if proceed {
            Ok(())
        } else {
            Err(LifecycleError::Aborted)
        }
    }

    async fn delete_bucket(&self, bucket: &BucketName, cleanup: &mut CleanupReport) {
        match self.provisioner().delete_bucket(bucket).await {
            Ok(()) => {
                cleanup.record(CleanupTask::Bucket, TaskStatus::Done);
                self.services
                    .reporter
                    .line(&format!("deleted the state bucket {bucket}"));
            }
            Err(err) => {
                self.services.reporter.warn(&format!(
                    "failed to delete the state bucket {bucket} ({err}); delete it from the cloud console"
                ));
                cleanup.record(CleanupTask::Bucket, TaskStatus::Failed(err.to_string()));
            }
        }
    }

    fn remove_environments(
        &self,
        endpoint: Option<&str>,
        cleanup: &mut CleanupReport,
    ) -> Removal {
        let Some(endpoint) = endpoint else {
            cleanup.record(
                CleanupTask::Registry,
                TaskStatus::Skipped(String::from("operator endpoint unknown")),
            );
            return Removal::default();
        };
        match self.reconciler().remove_by_endpoint(endpoint) {
            Ok(removal) => {
                cleanup.record(CleanupTask::Registry, TaskStatus::Done);
                self.report_removal(&removal);
                removal
            }
            Err(err) => {
                debug!(error = %err, "failed to remove environments");
                cleanup.record(CleanupTask::Registry, TaskStatus::Failed(err.to_string()));
                Removal::default()
            }
        }
    }

    fn report_removal(&self, removal: &Removal) {
        if removal.names.is_empty() {
            return;
        }
        let plural = if removal.names.len() == 1 { "" } else { "s" };
        self.services.reporter.line(&format!(
            "deleted the {} environment configuration{plural}",
            english_list(&removal.names)
        ));
        if removal.default_reset {
            self.services
                .reporter
                .line(&format!("set the default environment to {LOCAL_ENVIRONMENT}"));
        }
    }
}

fn reject_local(environment: &str) -> Result<(), LifecycleError> {
    if environment == LOCAL_ENVIRONMENT {
        return Err(AccessError::ReservedEnvironment(environment.to_owned()).into());
    }
    Ok(())
}

fn cluster_failure(access: &AccessConfig, source: ProviderError, rollback: &str) -> LifecycleError {
    let down = down_command(access);
    match source {
        ProviderError::TerminalState { .. } => {
            LifecycleError::TerminalState {
                message: format!("{source}; {rollback}; run `{down}` to remove the cluster"),
                source,
            }
        }
        ProviderError::Cancelled { .. } => LifecycleError::Cancelled {
            message: format!(
                "{source}; {rollback}; the cluster may still be provisioning, run `{down}` to remove it"
            ),
        },
        ProviderError::ProvisionTimeout { .. } => LifecycleError::Provisioning {
            message: format!("{source}; {rollback}; run `{down}` to remove the cluster"),
            source,
        },
        other => LifecycleError::Provisioning {
            message: format!("failed to create the cluster: {other}; {rollback}"),
            source: other,
        },
    }
}

fn coordinates(access: &AccessConfig) -> String {
    format!(
        "--name {} --project {} --zone {}",
        access.cluster_name, access.project, access.zone
    )
}

fn down_command(access: &AccessConfig) -> String {
    format!("gantry down {}", coordinates(access))
}

fn info_command(access: &AccessConfig, environment: &str) -> String {
    format!(
        "gantry info {} --configure-env {environment}",
        coordinates(access)
    )
}

fn kept_cluster_note(access: &AccessConfig) -> String {
    format!(
        "the cluster was kept for inspection; run `gantry info --debug {}` to collect diagnostics or `{}` to remove it",
        coordinates(access),
        down_command(access)
    )
}

fn exit_description(code: Option<i32>) -> String {
    code.map_or_else(
        || String::from("was terminated by a signal"),
        |value| format!("exited with code {value}"),
    )
}

/// Name of a debug bundle collected at `now`.
#[must_use]
pub fn debug_bundle_name(now: DateTime<Utc>) -> String {
    format!("gantry-debug-{}.tgz", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Joins names as English prose: `a`, `a and b`, `a, b and c`.
#[must_use]
pub fn english_list(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} and {last}", rest.join(", ")),
    }
}
