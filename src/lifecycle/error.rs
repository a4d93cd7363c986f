//! Errors surfaced by lifecycle commands.

use thiserror::Error;

use crate::access::AccessError;
use crate::discovery::DiscoveryError;
use crate::installer::InstallerError;
use crate::operator::OperatorError;
use crate::provider::ProviderError;
use crate::registry::RegistryError;

use super::CleanupReport;

/// Errors raised by `up`, `info`, `debug`, and `down`.
///
/// Messages already carry whatever rollback happened and, where the user
/// can recover without starting over, the command to run next.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Coordinates or cluster shape are missing or invalid.
    #[error(transparent)]
    Configuration(#[from] AccessError),
    /// The user declined a confirmation.
    #[error("aborted; nothing was changed")]
    Aborted,
    /// The container runtime is not usable.
    #[error(transparent)]
    Runtime(InstallerError),
    /// A cloud resource could not be created.
    #[error("{message}")]
    Provisioning {
        /// What failed and what was rolled back.
        message: String,
        /// Provider failure.
        #[source]
        source: ProviderError,
    },
    /// The cluster settled in a failed state while provisioning.
    #[error("{message}")]
    TerminalState {
        /// Provider diagnostic, console pointer, and rollback summary.
        message: String,
        /// Provider failure.
        #[source]
        source: ProviderError,
    },
    /// Waiting for the cluster was interrupted.
    #[error("{message}")]
    Cancelled {
        /// What was left behind.
        message: String,
    },
    /// A script ran but exited unsuccessfully.
    #[error("{message}")]
    Script {
        /// Summary, including the script output where it is the cause.
        message: String,
        /// Exit code, `None` when the script was killed.
        exit_code: Option<i32>,
        /// Combined output of the script.
        output: String,
    },
    /// A script could not be run.
    #[error("{message}: {source}")]
    Installer {
        /// What was being run and what was rolled back.
        message: String,
        /// Runtime failure.
        #[source]
        source: InstallerError,
    },
    /// The info script did not report an operator address.
    #[error("the info script did not report an `operator: ` address; the operator may not be installed")]
    MissingEndpoint {
        /// Combined output of the script.
        output: String,
    },
    /// The operator endpoint could not be discovered.
    #[error("{source}; once it is reachable, run `{remediation}` to configure the environment")]
    Discovery {
        /// Discovery failure.
        source: DiscoveryError,
        /// Command that finishes the job.
        remediation: String,
    },
    /// The environment registry could not be updated.
    #[error("failed to update the environment registry: {source}; run `{remediation}` to retry")]
    Registry {
        /// Registry failure.
        source: RegistryError,
        /// Command that retries the update.
        remediation: String,
    },
    /// The operator could not report cluster status.
    #[error(transparent)]
    Operator(#[from] OperatorError),
    /// Cluster deletion failed during `down`.
    #[error("failed to delete cluster {cluster}: {source}")]
    Teardown {
        /// Cluster that is still present.
        cluster: String,
        /// Provider failure.
        source: ProviderError,
        /// Outcome of every step attempted.
        report: Box<CleanupReport>,
    },
}
