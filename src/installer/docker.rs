//! Docker-backed container runtime.

use std::ffi::OsString;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::provider::BackendFuture;
use crate::runner::{CommandOutput, CommandRunner};

use super::{
    CONTAINER_CREDENTIALS_PATH, ContainerRuntime, InstallerError, ScriptOutput, ScriptRequest,
};

const MERGE_STDERR: &str = "exec 2>&1";

/// Runs scripts with the Docker CLI: create, start attached, copy files
/// out, and remove.
#[derive(Clone, Debug)]
pub struct DockerRuntime<R> {
    runner: R,
    docker_bin: String,
}

impl<R: CommandRunner> DockerRuntime<R> {
    /// Creates a runtime that invokes `docker_bin` through `runner`.
    #[must_use]
    pub fn new(runner: R, docker_bin: impl Into<String>) -> Self {
        Self {
            runner,
            docker_bin: docker_bin.into(),
        }
    }

    fn create_args(name: &str, request: &ScriptRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            OsString::from("create"),
            OsString::from("--name"),
            OsString::from(name),
        ];
        for (key, value) in &request.env {
            args.push(OsString::from("--env"));
            args.push(OsString::from(format!("{key}={value}")));
        }
        if let Some(credentials) = &request.credentials {
            args.push(OsString::from("--volume"));
            args.push(OsString::from(format!(
                "{credentials}:{CONTAINER_CREDENTIALS_PATH}:ro"
            )));
        }
        // Merged inside the container so stdout and stderr keep their order.
        let script = format!("{MERGE_STDERR}\n{}", request.command);
        args.extend(
            [
                "--entrypoint",
                "/bin/bash",
                request.image.as_str(),
                "-c",
                script.as_str(),
            ]
            .map(OsString::from),
        );
        args
    }

    fn docker(&self, args: &[&str]) -> Result<CommandOutput, InstallerError> {
        let owned: Vec<OsString> = args.iter().map(OsString::from).collect();
        self.runner
            .run(&self.docker_bin, &owned)
            .map_err(InstallerError::from)
    }

    fn copy_out(
        &self,
        name: &str,
        request: &ScriptRequest,
        script_succeeded: bool,
    ) -> Result<(), InstallerError> {
        for copy in &request.copy_out {
            let source = format!("{name}:{}", copy.container_path);
            let outcome = self.docker(&["cp", &source, copy.host_dir.as_str()]);
            let failure = match outcome {
                Ok(output) if output.is_success() => None,
                Ok(output) => Some(output.stderr.trim().to_owned()),
                Err(err) => Some(err.to_string()),
            };
            if let Some(message) = failure {
                if script_succeeded {
                    return Err(InstallerError::CopyOut {
                        path: copy.container_path.clone(),
                        message,
                    });
                }
                warn!(path = %copy.container_path, %message, "could not copy file out of the installer container");
            }
        }
        Ok(())
    }

    fn remove(&self, name: &str) {
        match self.docker(&["rm", "--force", name]) {
            Ok(output) if output.is_success() => debug!(container = name, "removed installer container"),
            Ok(output) => warn!(container = name, stderr = %output.stderr.trim(), "failed to remove installer container"),
            Err(err) => warn!(container = name, error = %err, "failed to remove installer container"),
        }
    }

    fn run_blocking(&self, request: &ScriptRequest) -> Result<ScriptOutput, InstallerError> {
        let name = format!("gantry-{}", Uuid::new_v4().simple());
        let created = self
            .runner
            .run(&self.docker_bin, &Self::create_args(&name, request))?;
        if !created.is_success() {
            return Err(InstallerError::Container {
                step: "create",
                message: created.stderr.trim().to_owned(),
            });
        }

        let attach = ["start", "--attach", name.as_str()].map(OsString::from);
        let result = self
            .runner
            .run_streaming(&self.docker_bin, &attach)
            .map_err(InstallerError::from)
            .and_then(|started| {
                let output = ScriptOutput {
                    output: started.combined(),
                    exit_code: started.code,
                };
                self.copy_out(&name, request, output.succeeded())?;
                Ok(output)
            });
        self.remove(&name);
        result
    }
}

impl<R: CommandRunner + Send + Sync> ContainerRuntime for DockerRuntime<R> {
    fn check_available(&self) -> Result<(), InstallerError> {
        let unavailable = |message: String| InstallerError::RuntimeUnavailable {
            runtime: self.docker_bin.clone(),
            message,
        };
        let output = self
            .docker(&["version", "--format", "{{.Server.Version}}"])
            .map_err(|err| unavailable(format!("{err}; install Docker and make sure it is on PATH")))?;
        if output.is_success() {
            debug!(version = %output.stdout.trim(), "docker daemon is reachable");
            Ok(())
        } else {
            Err(unavailable(format!(
                "{}; make sure the Docker daemon is running",
                output.stderr.trim()
            )))
        }
    }

    fn run_script<'a>(
        &'a self,
        request: &'a ScriptRequest,
    ) -> BackendFuture<'a, ScriptOutput, InstallerError> {
        Box::pin(async move { self.run_blocking(request) })
    }
}
