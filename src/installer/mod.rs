//! Runs the bundled installer image's scripts inside a container.
//!
//! The image carries three entry points: the installer, an inspection
//! script that prints the operator's address, and a debug collector. All
//! of them receive the cluster coordinates through environment variables
//! and read cloud credentials from a mounted key file.

mod docker;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::info;

use crate::access::{AccessConfig, ClusterConfig};
use crate::bucket::BucketName;
use crate::provider::BackendFuture;
use crate::runner::RunnerError;

pub use docker::DockerRuntime;

/// Installs the operator and its dependencies into the cluster.
pub const INSTALL_SCRIPT: &str = "/root/install.sh";
/// Prints cluster details, including the `operator: <address>` line.
pub const INFO_SCRIPT: &str = "/root/info.sh";
/// Collects a debug bundle at the path given as its only argument.
pub const DEBUG_SCRIPT: &str = "/root/debug.sh";
/// Where the credentials key file is mounted inside the container.
pub const CONTAINER_CREDENTIALS_PATH: &str = "/var/secrets/google/key.json";
/// Directory inside the container for files meant to be copied out.
pub const CONTAINER_OUTPUT_DIR: &str = "/out";
/// Prefix of the inspection output line naming the operator address.
pub const OPERATOR_LINE_PREFIX: &str = "operator: ";

/// Errors raised while running installer scripts. A script that runs and
/// exits non-zero is not an error; see [`ScriptOutput::exit_code`].
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum InstallerError {
    /// The container runtime is missing or not responding.
    #[error("{runtime} is not available: {message}")]
    RuntimeUnavailable {
        /// Runtime binary.
        runtime: String,
        /// Diagnostic from the runtime.
        message: String,
    },
    /// A container management step failed.
    #[error("failed to {step} the installer container: {message}")]
    Container {
        /// Step that failed.
        step: &'static str,
        /// Diagnostic from the runtime.
        message: String,
    },
    /// A requested output file could not be copied to the host.
    #[error("failed to copy {path} out of the installer container: {message}")]
    CopyOut {
        /// Path inside the container.
        path: String,
        /// Diagnostic from the runtime.
        message: String,
    },
    /// The runtime binary could not be executed.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// File to copy from the container to the host after the script runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopyOut {
    /// Absolute path inside the container.
    pub container_path: String,
    /// Host directory receiving the file.
    pub host_dir: Utf8PathBuf,
}

/// One script invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptRequest {
    /// Installer image reference.
    pub image: String,
    /// Shell command executed with `bash -c`.
    pub command: String,
    /// Environment passed to the script.
    pub env: BTreeMap<String, String>,
    /// Host key file mounted at [`CONTAINER_CREDENTIALS_PATH`].
    pub credentials: Option<Utf8PathBuf>,
    /// Files copied out once the script finishes, whatever its exit code.
    pub copy_out: Vec<CopyOut>,
}

/// What a script printed and how it exited.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptOutput {
    /// Everything the script printed. Its stderr is redirected into stdout
    /// before it runs, so lines appear in the order they were written.
    pub output: String,
    /// Exit code, `None` when the script was killed.
    pub exit_code: Option<i32>,
}

impl ScriptOutput {
    /// Returns `true` when the script exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Executes scripts in an isolated container.
pub trait ContainerRuntime: Send + Sync {
    /// Verifies the runtime is installed and its daemon answers.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::RuntimeUnavailable`] otherwise.
    fn check_available(&self) -> Result<(), InstallerError>;

    /// Runs `request` to completion, streaming output to the terminal.
    fn run_script<'a>(
        &'a self,
        request: &'a ScriptRequest,
    ) -> BackendFuture<'a, ScriptOutput, InstallerError>;
}

/// Cluster a script operates on.
#[derive(Clone, Copy, Debug)]
pub enum ScriptTarget<'a> {
    /// An existing cluster; only coordinates are passed.
    Existing(&'a AccessConfig),
    /// A cluster being set up; node shape and bucket are passed too.
    New {
        /// Full cluster configuration.
        config: &'a ClusterConfig,
        /// State bucket created for it.
        bucket: &'a BucketName,
    },
}

impl ScriptTarget<'_> {
    fn access(&self) -> &AccessConfig {
        match self {
            Self::Existing(access) => access,
            Self::New { config, .. } => &config.access,
        }
    }
}

/// Environment passed to installer scripts for `target`.
#[must_use]
pub fn script_environment(target: ScriptTarget<'_>) -> BTreeMap<String, String> {
    let access = target.access();
    let mut env = BTreeMap::from([
        (String::from("GANTRY_PROVIDER"), String::from("gcp")),
        (String::from("GANTRY_CLUSTER_NAME"), access.cluster_name.clone()),
        (String::from("GANTRY_PROJECT"), access.project.clone()),
        (String::from("GANTRY_ZONE"), access.zone.clone()),
        (String::from("GANTRY_REGION"), access.region().to_owned()),
    ]);
    if let ScriptTarget::New { config, bucket } = target {
        env.insert(String::from("GANTRY_BUCKET"), bucket.to_string());
        env.insert(String::from("GANTRY_INSTANCE_TYPE"), config.instance_type.clone());
        env.insert(
            String::from("GANTRY_MIN_INSTANCES"),
            config.min_instances.to_string(),
        );
        env.insert(
            String::from("GANTRY_MAX_INSTANCES"),
            config.max_instances.to_string(),
        );
        if let Some(accelerator) = &config.accelerator_type {
            env.insert(String::from("GANTRY_ACCELERATOR_TYPE"), accelerator.clone());
        }
    }
    env
}

/// Extracts the operator URL from inspection output. The address on the
/// first `operator: ` line is returned with an `https://` scheme.
#[must_use]
pub fn parse_operator_endpoint(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(OPERATOR_LINE_PREFIX))
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(|address| {
            if address.starts_with("https://") {
                address.to_owned()
            } else {
                format!("https://{address}")
            }
        })
}

/// Runs installer scripts for a configured image and credentials file.
pub struct InstallerRunner<'a> {
    runtime: &'a dyn ContainerRuntime,
    image: String,
    credentials: Option<Utf8PathBuf>,
}

impl<'a> InstallerRunner<'a> {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        image: impl Into<String>,
        credentials: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            runtime,
            image: image.into(),
            credentials,
        }
    }

    /// Verifies the container runtime is usable.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::RuntimeUnavailable`] otherwise.
    pub fn check_runtime(&self) -> Result<(), InstallerError> {
        self.runtime.check_available()
    }

    /// Runs `command` for `target` and returns its output and exit code.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError`] when the container cannot be run. A
    /// non-zero exit is reported through the returned [`ScriptOutput`].
    pub async fn run(
        &self,
        command: &str,
        target: ScriptTarget<'_>,
        copy_out: Vec<CopyOut>,
    ) -> Result<ScriptOutput, InstallerError> {
        let mut env = script_environment(target);
        if self.credentials.is_some() {
            env.insert(
                String::from("GOOGLE_APPLICATION_CREDENTIALS"),
                CONTAINER_CREDENTIALS_PATH.to_owned(),
            );
        }
        let request = ScriptRequest {
            image: self.image.clone(),
            command: command.to_owned(),
            env,
            credentials: self.credentials.clone(),
            copy_out,
        };
        info!(image = %request.image, command, "running installer script");
        self.runtime.run_script(&request).await
    }
}
