//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::provider::PollSettings;
use crate::registry::LOCAL_ENVIRONMENT;
use crate::store::expand_tilde;

/// Environment variable naming the service account key when
/// `credentials_file` is not configured.
pub const GOOGLE_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Tool settings layered from defaults, `gantry.toml`, and `GANTRY_*`
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "GANTRY",
    discovery(
        app_name = "gantry",
        env_var = "GANTRY_CONFIG_PATH",
        config_file_name = "gantry.toml",
        dotfile_name = ".gantry.toml",
        project_file_name = "gantry.toml"
    )
)]
pub struct GantrySettings {
    /// Installer image that carries the install, info, and debug scripts.
    #[ortho_config(default = "gantry/installer:latest".to_owned())]
    pub image: String,
    /// Container runtime binary.
    #[ortho_config(default = "docker".to_owned())]
    pub docker_bin: String,
    /// Cloud SDK binary used to mint access tokens.
    #[ortho_config(default = "gcloud".to_owned())]
    pub gcloud_bin: String,
    /// Service account key file. Falls back to
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    pub credentials_file: Option<String>,
    /// Seconds between cluster status reads.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Upper bound on waiting for a cluster, in seconds. Zero waits until
    /// interrupted.
    #[ortho_config(default = 0)]
    pub provision_timeout_secs: u64,
    /// Directory holding the environment registry and cached coordinates.
    #[ortho_config(default = "~/.gantry".to_owned())]
    pub state_dir: String,
    /// Environment configured by `up` when `--configure-env` is not given.
    #[ortho_config(default = "gcp".to_owned())]
    pub default_environment: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to gantry.toml",
            self.env_var, self.toml_key
        )
    }
}

const IMAGE: FieldMetadata = FieldMetadata::new("installer image", "GANTRY_IMAGE", "image");
const DOCKER_BIN: FieldMetadata =
    FieldMetadata::new("container runtime binary", "GANTRY_DOCKER_BIN", "docker_bin");
const GCLOUD_BIN: FieldMetadata =
    FieldMetadata::new("cloud SDK binary", "GANTRY_GCLOUD_BIN", "gcloud_bin");
const STATE_DIR: FieldMetadata =
    FieldMetadata::new("state directory", "GANTRY_STATE_DIR", "state_dir");
const DEFAULT_ENVIRONMENT: FieldMetadata = FieldMetadata::new(
    "default environment",
    "GANTRY_DEFAULT_ENVIRONMENT",
    "default_environment",
);
const POLL_INTERVAL: FieldMetadata = FieldMetadata::new(
    "poll interval",
    "GANTRY_POLL_INTERVAL_SECS",
    "poll_interval_secs",
);

impl GantrySettings {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), SettingsError> {
        if value.trim().is_empty() {
            return Err(SettingsError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads settings without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, SettingsError> {
        Self::load_from_iter([OsString::from("gantry")])
            .map_err(|err| SettingsError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages say how to provide the
    /// value through the environment or `gantry.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingField`] when a required value is
    /// empty and [`SettingsError::Invalid`] when a value is out of range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        Self::require_field(&self.image, &IMAGE)?;
        Self::require_field(&self.docker_bin, &DOCKER_BIN)?;
        Self::require_field(&self.gcloud_bin, &GCLOUD_BIN)?;
        Self::require_field(&self.state_dir, &STATE_DIR)?;
        Self::require_field(&self.default_environment, &DEFAULT_ENVIRONMENT)?;
        if self.poll_interval_secs == 0 {
            return Err(SettingsError::Invalid(format!(
                "{} must be at least one second: {}",
                POLL_INTERVAL.description,
                POLL_INTERVAL.hint()
            )));
        }
        if self.default_environment == LOCAL_ENVIRONMENT {
            return Err(SettingsError::Invalid(format!(
                "{} cannot be `{LOCAL_ENVIRONMENT}`: {}",
                DEFAULT_ENVIRONMENT.description,
                DEFAULT_ENVIRONMENT.hint()
            )));
        }
        Ok(())
    }

    /// Polling behaviour for cluster creation.
    #[must_use]
    pub const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: if self.provision_timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(self.provision_timeout_secs))
            },
        }
    }

    /// State directory with `~` expanded.
    #[must_use]
    pub fn state_path(&self) -> Utf8PathBuf {
        expand_tilde(&self.state_dir)
    }

    /// Location of the environment registry.
    #[must_use]
    pub fn registry_path(&self) -> Utf8PathBuf {
        self.state_path().join("environments.toml")
    }

    /// Directory of cached cluster coordinates.
    #[must_use]
    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.state_path().join("cluster-configs")
    }

    /// Service account key, from settings or the standard environment
    /// variable.
    #[must_use]
    pub fn credentials_path(&self) -> Option<Utf8PathBuf> {
        self.credentials_file
            .clone()
            .or_else(|| std::env::var(GOOGLE_CREDENTIALS_ENV).ok())
            .filter(|path| !path.trim().is_empty())
            .map(|path| expand_tilde(&path))
    }
}

/// Errors raised during settings loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    /// A required setting is empty.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A setting is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for SettingsError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EnvGuard;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid_settings() -> GantrySettings {
        GantrySettings {
            image: String::from("gantry/installer:0.1"),
            docker_bin: String::from("docker"),
            gcloud_bin: String::from("gcloud"),
            credentials_file: None,
            poll_interval_secs: 5,
            provision_timeout_secs: 0,
            state_dir: String::from("/var/lib/gantry"),
            default_environment: String::from("gcp"),
        }
    }

    #[rstest]
    #[case::image(|s: &mut GantrySettings| s.image.clear(), "GANTRY_IMAGE", "image")]
    #[case::docker(|s: &mut GantrySettings| s.docker_bin = String::from(" "), "GANTRY_DOCKER_BIN", "docker_bin")]
    #[case::state(|s: &mut GantrySettings| s.state_dir.clear(), "GANTRY_STATE_DIR", "state_dir")]
    #[case::interval(|s: &mut GantrySettings| s.poll_interval_secs = 0, "GANTRY_POLL_INTERVAL_SECS", "poll_interval_secs")]
    #[case::local(|s: &mut GantrySettings| s.default_environment = String::from("local"), "GANTRY_DEFAULT_ENVIRONMENT", "default_environment")]
    fn validation_errors_are_actionable(
        valid_settings: GantrySettings,
        #[case] mutate: fn(&mut GantrySettings),
        #[case] env_var: &str,
        #[case] toml_key: &str,
    ) {
        let mut settings = valid_settings;
        mutate(&mut settings);

        let message = settings.validate().expect_err("invalid").to_string();

        assert!(message.contains(env_var), "should mention {env_var}: {message}");
        assert!(message.contains(toml_key), "should mention {toml_key}: {message}");
        assert!(message.contains("gantry.toml"), "should mention the file: {message}");
    }

    #[rstest]
    fn zero_timeout_means_unbounded(valid_settings: GantrySettings) {
        let poll = valid_settings.poll_settings();
        assert_eq!(poll.interval, Duration::from_secs(5));
        assert_eq!(poll.timeout, None);

        let bounded = GantrySettings {
            provision_timeout_secs: 900,
            ..valid_settings
        };
        assert_eq!(bounded.poll_settings().timeout, Some(Duration::from_secs(900)));
    }

    #[rstest]
    fn state_files_live_under_the_state_dir(valid_settings: GantrySettings) {
        assert_eq!(
            valid_settings.registry_path(),
            Utf8PathBuf::from("/var/lib/gantry/environments.toml")
        );
        assert_eq!(
            valid_settings.cache_dir(),
            Utf8PathBuf::from("/var/lib/gantry/cluster-configs")
        );
    }

    #[rstest]
    #[tokio::test]
    async fn environment_overrides_defaults() {
        let _guard = EnvGuard::set_vars(
            &[
                ("GANTRY_IMAGE", "registry.test/installer:2"),
                ("GANTRY_PROVISION_TIMEOUT_SECS", "600"),
            ],
            &["GANTRY_CONFIG_PATH", "GANTRY_POLL_INTERVAL_SECS"],
        )
        .await;

        let settings = GantrySettings::load_without_cli_args().expect("settings load");

        assert_eq!(settings.image, "registry.test/installer:2");
        assert_eq!(settings.provision_timeout_secs, 600);
        assert_eq!(settings.poll_interval_secs, 5);
    }

    #[rstest]
    #[tokio::test]
    async fn credentials_fall_back_to_the_standard_variable(valid_settings: GantrySettings) {
        let _guard = EnvGuard::set_vars(&[(GOOGLE_CREDENTIALS_ENV, "/keys/sa.json")], &[]).await;

        assert_eq!(
            valid_settings.credentials_path(),
            Some(Utf8PathBuf::from("/keys/sa.json"))
        );
        let explicit = GantrySettings {
            credentials_file: Some(String::from("/keys/other.json")),
            ..valid_settings
        };
        assert_eq!(
            explicit.credentials_path(),
            Some(Utf8PathBuf::from("/keys/other.json"))
        );
    }
}
