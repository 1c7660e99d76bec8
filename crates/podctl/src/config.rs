//! Configuration loaded once at startup from environment variables (and a
//! `.env` file via dotenvy in `main`), then passed by parameter into the API
//! client and orchestrator. Business logic never reads ambient globals.

use std::time::Duration;

use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Credentials for the volume's S3-compatible object API.
///
/// Both halves must be provided together or both omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub s3_access_key_id: Option<SecretString>,
    pub s3_secret_key: Option<SecretString>,
}

/// Paired S3 credentials (both present)
#[derive(Debug, Clone)]
pub struct StorageCredentials {
    pub access_key_id: SecretString,
    pub secret_key: SecretString,
}

impl StorageConfig {
    /// Returns an error if only one credential half is provided
    pub fn validate(&self) -> Result<(), String> {
        match (&self.s3_access_key_id, &self.s3_secret_key) {
            (Some(_), None) => {
                Err("RUNPOD_S3_SECRET_KEY is required when RUNPOD_S3_ACCESS_KEY_ID is set".into())
            }
            (None, Some(_)) => {
                Err("RUNPOD_S3_ACCESS_KEY_ID is required when RUNPOD_S3_SECRET_KEY is set".into())
            }
            _ => Ok(()),
        }
    }

    /// The credentials, if both halves are present
    pub fn credentials(&self) -> Option<StorageCredentials> {
        match (&self.s3_access_key_id, &self.s3_secret_key) {
            (Some(id), Some(secret)) => Some(StorageCredentials {
                access_key_id: id.clone(),
                secret_key: secret.clone(),
            }),
            _ => None,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Provider API key (RUNPOD_API_KEY)
    pub api_key: SecretString,

    /// Base URL of the provider REST API, overridable for testing
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Log level for this application's target specifically,
    /// e.g. "debug" expands to "warn,podctl=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Network volume to attach to created pods and to use for script uploads
    pub network_volume_id: Option<String>,

    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Git identity propagated into the pod's user setup script
    pub git_email: Option<String>,
    pub git_name: Option<String>,

    /// Public key appended to the pod's authorized_keys, if set
    pub ssh_public_key_path: Option<String>,

    /// Fixed sleep between readiness polls
    ///
    /// Accepts both numeric values (seconds) and duration strings ("5s", "500ms")
    #[serde(default = "default_poll_interval", deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,

    /// Maximum number of readiness polls before giving up
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Whether a failed best-effort provisioning step (script upload) should
    /// terminate the just-created pod instead of leaving it half-configured
    #[serde(default)]
    pub terminate_on_setup_failure: bool,
}

fn default_api_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default poll interval of 5 seconds
fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

/// Default of 120 polls (10 minutes at the default interval)
fn default_poll_attempts() -> u32 {
    120
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, figment::Error> {
        let config: Config = Figment::new()
            .merge(Env::raw().map(|k| {
                // Map environment variable names to struct field names
                match k.as_str() {
                    "RUNPOD_API_KEY" => "api_key".into(),
                    "RUNPOD_NETWORK_VOLUME_ID" => "network_volume_id".into(),
                    "RUNPOD_S3_ACCESS_KEY_ID" => "s3_access_key_id".into(),
                    "RUNPOD_S3_SECRET_KEY" => "s3_secret_key".into(),
                    "GIT_EMAIL" => "git_email".into(),
                    "GIT_NAME" => "git_name".into(),
                    "SSH_PUBLIC_KEY_PATH" => "ssh_public_key_path".into(),
                    "LOG_LEVEL" => "log_level".into(),
                    "PODCTL_API_BASE_URL" => "api_base_url".into(),
                    "PODCTL_POLL_INTERVAL" => "poll_interval".into(),
                    "PODCTL_POLL_ATTEMPTS" => "poll_attempts".into(),
                    "PODCTL_TERMINATE_ON_SETUP_FAILURE" => "terminate_on_setup_failure".into(),
                    _ => k.into(),
                }
            }))
            .extract()?;

        config.storage.validate().map_err(figment::Error::from)?;
        Ok(config)
    }
}

/// Duration parser accepting seconds (default unit), milliseconds and minutes
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[TimeUnit::Second, TimeUnit::MilliSecond, TimeUnit::Minute])
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

/// Deserialize a duration from either a bare number (seconds) or a string
/// with units ("30s", "500ms", "2m")
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number of seconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            DURATION_PARSER
                .parse(value)
                .map_err(|e| {
                    serde::de::Error::custom(format!("invalid duration '{value}': {e}"))
                })?
                .try_into()
                .map_err(|e| serde::de::Error::custom(format!("duration out of range: {e}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| serde::de::Error::custom("duration cannot be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_with_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUNPOD_API_KEY", "rp-key");
            let config = Config::load().expect("config should load");
            assert_eq!(config.api_base_url, crate::api::DEFAULT_BASE_URL);
            assert_eq!(config.poll_interval, Duration::from_secs(5));
            assert_eq!(config.poll_attempts, 120);
            assert!(!config.terminate_on_setup_failure);
            assert!(config.network_volume_id.is_none());
            Ok(())
        });
    }

    #[test]
    fn parses_duration_strings() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUNPOD_API_KEY", "rp-key");
            jail.set_env("PODCTL_POLL_INTERVAL", "500ms");
            jail.set_env("PODCTL_POLL_ATTEMPTS", "3");
            let config = Config::load().expect("config should load");
            assert_eq!(config.poll_interval, Duration::from_millis(500));
            assert_eq!(config.poll_attempts, 3);
            Ok(())
        });
    }

    #[test]
    fn lone_s3_credential_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUNPOD_API_KEY", "rp-key");
            jail.set_env("RUNPOD_S3_ACCESS_KEY_ID", "id-only");
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn paired_s3_credentials_are_exposed() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUNPOD_API_KEY", "rp-key");
            jail.set_env("RUNPOD_S3_ACCESS_KEY_ID", "id");
            jail.set_env("RUNPOD_S3_SECRET_KEY", "secret");
            let config = Config::load().expect("config should load");
            assert!(config.storage.credentials().is_some());
            Ok(())
        });
    }
}
