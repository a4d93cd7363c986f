//! Access tokens and service account metadata for Google Cloud.

use std::ffi::OsString;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Deserialize;
use tracing::debug;

use crate::provider::ProviderError;
use crate::runner::CommandRunner;
use crate::store;

/// Tokens printed by gcloud live for an hour; refresh well before that.
const TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Obtains OAuth access tokens by asking the `gcloud` CLI for the
/// application default credentials.
pub struct GcloudTokenSource<R> {
    runner: R,
    gcloud_bin: String,
    cached: Mutex<Option<(String, Instant)>>,
}

impl<R: CommandRunner> GcloudTokenSource<R> {
    /// Creates a token source that invokes `gcloud_bin` through `runner`.
    #[must_use]
    pub fn new(runner: R, gcloud_bin: impl Into<String>) -> Self {
        Self {
            runner,
            gcloud_bin: gcloud_bin.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token, reusing a recent one when available.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] when gcloud fails or prints nothing.
    pub fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().map_err(|_| ProviderError::Auth {
            message: String::from("token cache lock poisoned"),
        })?;
        if let Some((token, fetched)) = cached.as_ref()
            && fetched.elapsed() < TOKEN_TTL
        {
            return Ok(token.clone());
        }

        debug!(program = %self.gcloud_bin, "requesting access token");
        let args = ["auth", "application-default", "print-access-token"].map(OsString::from);
        let output = self.runner.run(&self.gcloud_bin, &args)?;
        if !output.is_success() {
            return Err(ProviderError::Auth {
                message: format!(
                    "{} exited with {}: {}",
                    self.gcloud_bin,
                    output
                        .code
                        .map_or_else(|| String::from("a signal"), |code| format!("status {code}")),
                    output.stderr.trim()
                ),
            });
        }
        let token = output.stdout.trim().to_owned();
        if token.is_empty() {
            return Err(ProviderError::Auth {
                message: format!("{} printed an empty token", self.gcloud_bin),
            });
        }
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

/// Fields of a service account key file the CLI cares about.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ServiceAccountKey {
    /// Project the service account belongs to.
    pub project_id: Option<String>,
    /// Service account e-mail; node pools run as this identity.
    pub client_email: Option<String>,
}

impl ServiceAccountKey {
    /// Reads a JSON key file.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when the file is missing or is not
    /// a key file.
    pub fn load(path: &Utf8Path) -> Result<Self, ProviderError> {
        let contents = store::read_optional(path)
            .map_err(|err| ProviderError::Config(err.to_string()))?
            .ok_or_else(|| {
                ProviderError::Config(format!("credentials file {path} does not exist"))
            })?;
        serde_json::from_str(&contents).map_err(|err| {
            ProviderError::Config(format!("credentials file {path} is not a key file: {err}"))
        })
    }
}
