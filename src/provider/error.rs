//! Error types for cloud providers.

use thiserror::Error;

use crate::runner::RunnerError;

/// Errors raised by cluster and storage providers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// Raised when provider configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when an access token cannot be obtained.
    #[error("failed to obtain an access token: {message}")]
    Auth {
        /// Explanation from the token source.
        message: String,
    },
    /// Raised when the provider API rejects a request.
    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        /// Operation being attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Provider error message.
        message: String,
    },
    /// Raised when the provider cannot be reached.
    #[error("{operation} failed: {message}")]
    Transport {
        /// Operation being attempted.
        operation: String,
        /// Transport error text.
        message: String,
    },
    /// Raised when a bucket name is taken by someone else.
    #[error("bucket {bucket} already exists and belongs to another account")]
    BucketCollision {
        /// Bucket name.
        bucket: String,
    },
    /// Raised when the cluster reaches the error state.
    #[error("cluster {cluster} failed to provision: {message}; see {console_url}")]
    TerminalState {
        /// Cluster handle.
        cluster: String,
        /// Provider status message.
        message: String,
        /// Console page for the cluster.
        console_url: String,
    },
    /// Raised when a configured provisioning bound elapses.
    #[error("cluster {cluster} was still provisioning after {waited_secs}s")]
    ProvisionTimeout {
        /// Cluster handle.
        cluster: String,
        /// Seconds spent waiting.
        waited_secs: u64,
    },
    /// Raised when waiting is cancelled by the user.
    #[error("stopped waiting for cluster {cluster}")]
    Cancelled {
        /// Cluster handle.
        cluster: String,
    },
    /// Raised when a snapshot lacks a field needed for credentials.
    #[error("cluster {field} is not available yet")]
    MissingClusterField {
        /// Missing field name.
        field: &'static str,
    },
    /// Raised when a provider response cannot be decoded.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        /// Operation being attempted.
        operation: String,
        /// Decoder error text.
        message: String,
    },
}

impl From<RunnerError> for ProviderError {
    fn from(err: RunnerError) -> Self {
        Self::Auth {
            message: err.to_string(),
        }
    }
}
