//! Errors raised while resolving access coordinates.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::prompt::PromptError;

/// Errors raised while resolving or validating cluster coordinates.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AccessError {
    /// A required value was not supplied and could not be prompted for.
    #[error("missing {field}: pass {flag} or set it in the cluster configuration file")]
    MissingField {
        /// Human-readable field name.
        field: &'static str,
        /// Command line flag that supplies the field.
        flag: &'static str,
    },
    /// A supplied value is malformed.
    #[error("invalid {field}: {message}")]
    InvalidField {
        /// Human-readable field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },
    /// The cluster configuration file could not be loaded.
    #[error("failed to load cluster configuration {path}: {message}")]
    ConfigFile {
        /// File passed with `--config`.
        path: Utf8PathBuf,
        /// Underlying failure.
        message: String,
    },
    /// The reserved `local` environment was targeted.
    #[error("the `{0}` environment is reserved and cannot point at a cluster; choose another --configure-env name")]
    ReservedEnvironment(String),
    /// Prompting failed for a reason other than being disallowed.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl AccessError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
