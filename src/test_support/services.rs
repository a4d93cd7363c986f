//! Container runtime, service directory, and operator doubles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::discovery::{DiscoveryError, ServiceDirectory};
use crate::installer::{ContainerRuntime, InstallerError, ScriptOutput, ScriptRequest};
use crate::operator::{OperatorClient, OperatorError, OperatorInfo};
use crate::provider::{BackendFuture, ClusterCredentials};

use super::locked;

/// Container runtime answering from a queue of script results.
///
/// An exhausted queue yields a successful, silent run. Files requested
/// through [`ScriptRequest::copy_out`] are written to the host directory
/// whenever the container ran, mirroring a real copy.
#[derive(Clone, Debug, Default)]
pub struct FakeRuntime {
    unavailable: Arc<Mutex<Option<InstallerError>>>,
    results: Arc<Mutex<VecDeque<Result<ScriptOutput, InstallerError>>>>,
    requests: Arc<Mutex<Vec<ScriptRequest>>>,
}

impl FakeRuntime {
    /// Creates a runtime whose scripts succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the availability check fail.
    pub fn set_unavailable(&self, message: &str) {
        *locked(&self.unavailable) = Some(InstallerError::RuntimeUnavailable {
            runtime: String::from("docker"),
            message: message.to_owned(),
        });
    }

    /// Queues the result of the next script.
    pub fn push_exit(&self, code: i32, output: &str) {
        locked(&self.results).push_back(Ok(ScriptOutput {
            output: output.to_owned(),
            exit_code: Some(code),
        }));
    }

    /// Queues a failure to run the next script at all.
    pub fn push_error(&self, error: InstallerError) {
        locked(&self.results).push_back(Err(error));
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ScriptRequest> {
        locked(&self.requests).clone()
    }

    /// Commands received so far.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.command)
            .collect()
    }
}

impl ContainerRuntime for FakeRuntime {
    fn check_available(&self) -> Result<(), InstallerError> {
        locked(&self.unavailable).clone().map_or(Ok(()), Err)
    }

    fn run_script<'a>(
        &'a self,
        request: &'a ScriptRequest,
    ) -> BackendFuture<'a, ScriptOutput, InstallerError> {
        locked(&self.requests).push(request.clone());
        let result = locked(&self.results).pop_front().unwrap_or_else(|| {
            Ok(ScriptOutput {
                output: String::new(),
                exit_code: Some(0),
            })
        });
        if result.is_ok() {
            for copy in &request.copy_out {
                let name = copy
                    .container_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(copy.container_path.as_str());
                if let Err(err) = std::fs::write(copy.host_dir.join(name), b"bundle") {
                    return Box::pin(async move {
                        Err(InstallerError::CopyOut {
                            path: name.to_owned(),
                            message: err.to_string(),
                        })
                    });
                }
            }
        }
        Box::pin(async move { result })
    }
}

/// Service directory with a fixed answer.
#[derive(Clone, Debug)]
pub struct FakeDirectory {
    answer: Arc<Mutex<Result<Option<Vec<String>>, DiscoveryError>>>,
    queries: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for FakeDirectory {
    fn default() -> Self {
        Self::with_ips(&["1.2.3.4"])
    }
}

impl FakeDirectory {
    /// Directory whose gateway service exposes `ips`.
    #[must_use]
    pub fn with_ips(ips: &[&str]) -> Self {
        Self::answering(Ok(Some(ips.iter().map(|ip| (*ip).to_owned()).collect())))
    }

    /// Directory without the gateway service.
    #[must_use]
    pub fn missing() -> Self {
        Self::answering(Ok(None))
    }

    /// Directory that cannot be reached.
    #[must_use]
    pub fn unreachable(message: &str) -> Self {
        Self::answering(Err(DiscoveryError::Transport(message.to_owned())))
    }

    fn answering(answer: Result<Option<Vec<String>>, DiscoveryError>) -> Self {
        Self {
            answer: Arc::new(Mutex::new(answer)),
            queries: Arc::default(),
        }
    }

    /// `(namespace, service)` pairs queried so far.
    #[must_use]
    pub fn queries(&self) -> Vec<(String, String)> {
        locked(&self.queries).clone()
    }
}

impl ServiceDirectory for FakeDirectory {
    fn load_balancer_ips<'a>(
        &'a self,
        _credentials: &'a ClusterCredentials,
        namespace: &'a str,
        service: &'a str,
    ) -> BackendFuture<'a, Option<Vec<String>>, DiscoveryError> {
        locked(&self.queries).push((namespace.to_owned(), service.to_owned()));
        let answer = locked(&self.answer).clone();
        Box::pin(async move { answer })
    }
}

/// Operator client with a fixed answer.
#[derive(Clone, Debug)]
pub struct FakeOperator {
    answer: Arc<Mutex<Result<OperatorInfo, OperatorError>>>,
    endpoints: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeOperator {
    fn default() -> Self {
        Self::answering(Ok(OperatorInfo {
            raw: serde_json::json!({ "status": "ready" }),
        }))
    }
}

impl FakeOperator {
    /// Operator returning `raw` as its status document.
    #[must_use]
    pub fn with_info(raw: Value) -> Self {
        Self::answering(Ok(OperatorInfo { raw }))
    }

    /// Operator that cannot be reached.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::answering(Err(OperatorError::Unreachable {
            endpoint: String::from("https://1.2.3.4"),
            message: String::from("connection refused"),
        }))
    }

    fn answering(answer: Result<OperatorInfo, OperatorError>) -> Self {
        Self {
            answer: Arc::new(Mutex::new(answer)),
            endpoints: Arc::default(),
        }
    }

    /// Endpoints queried so far.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        locked(&self.endpoints).clone()
    }
}

impl OperatorClient for FakeOperator {
    fn cluster_info<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> BackendFuture<'a, OperatorInfo, OperatorError> {
        locked(&self.endpoints).push(endpoint.to_owned());
        let answer = locked(&self.answer).clone();
        Box::pin(async move { answer })
    }
}
