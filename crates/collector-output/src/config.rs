// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Output configuration.
//!
//! Sources are applied in this order, later ones overriding earlier ones:
//!
//! 1. **Defaults** - `CollectorConfig::default()`
//! 2. **YAML file** - usually `collector.yaml`, skipped when missing
//! 3. **Environment variables** - `COLLECTOR_*`, with `__` separating nested keys
//!    (e.g. `COLLECTOR_OUTPUT__COMPRESS_LEVEL=0`)
//!
//! Durations accept seconds (`30`) or a humantime string (`500ms`, `30s`, `5m`,
//! `1h 30m`). Values too large for a `Duration` are rejected.
//!
//! ```yaml
//! hosts: ["http://collector:7076"]
//! compress_level: 9
//! body_bytes_per_second: 3145728
//! auth:
//!   type: key
//! cluster_key: my-cluster
//! output:
//!   timeout: 10s
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

use crate::auth::{AUTH_TYPE_BASIC, AUTH_TYPE_KEY, PROPERTY_ACCESS_KEY};
use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "COLLECTOR_";

const DEFAULT_CREDENTIAL_DIR: &str = "/erda-cluster-credential";
const DEFAULT_CREDENTIAL_FILE: &str = "CLUSTER_ACCESS_KEY";
const DEFAULT_CREDENTIAL_MARKER: &str = "data";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Collector base URLs. One client is built per host.
    pub hosts: Vec<String>,
    pub job_path: String,
    pub container_path: String,
    /// Query parameters added to both collector requests.
    pub params: HashMap<String, String>,
    /// Static headers added to both collector requests.
    pub headers: HashMap<String, String>,
    pub method: String,
    pub ssl: TlsConfig,
    #[serde(deserialize_with = "deserialize_duration")]
    pub keep_alive: Duration,
    /// Connect and request timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    // Retry and batching settings are consumed by the host pipeline, not by the client.
    pub bulk_max_size: usize,
    /// Negative means retry forever.
    pub max_retries: i64,
    pub backoff: BackoffConfig,
    pub load_balance: bool,
    /// 0 sends plain JSON, 1 to 9 gzip at that level.
    pub compress_level: u32,
    /// Refill rate of the body rate limiter. 0 disables limiting.
    pub body_bytes_per_second: u64,
    /// Initial burst of the body rate limiter.
    pub body_max_bytes: usize,
    /// Settings for mirroring events to the collector named in the event.
    pub output: FanoutConfig,
    pub auth: AuthConfig,
    pub cluster_key: String,
    pub credential: CredentialConfig,
    pub log_level: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            job_path: "/api/v1/collect/logs/job".to_string(),
            container_path: "/api/v1/collect/logs/container".to_string(),
            params: HashMap::new(),
            headers: HashMap::new(),
            method: "POST".to_string(),
            ssl: TlsConfig::default(),
            keep_alive: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
            bulk_max_size: 50,
            max_retries: -1,
            backoff: BackoffConfig::default(),
            load_balance: true,
            compress_level: 9,
            body_bytes_per_second: 3 * 1024 * 1024,
            body_max_bytes: 5 * 1024 * 1024,
            output: FanoutConfig::default(),
            auth: AuthConfig::default(),
            cluster_key: String::new(),
            credential: CredentialConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl CollectorConfig {
    /// Loads the YAML file at `path` (if present) and `COLLECTOR_*` overrides on top of the
    /// defaults, then validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: CollectorConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compress_level > 9 {
            return Err(ConfigError::Invalid(format!(
                "compress_level {} must be between 0 and 9",
                self.compress_level
            )));
        }
        if self.output.compress_level > 9 {
            return Err(ConfigError::Invalid(format!(
                "output.compress_level {} must be between 0 and 9",
                self.output.compress_level
            )));
        }
        if self.body_max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "body_max_bytes must be greater than 0".to_string(),
            ));
        }
        if self.method.trim().is_empty() || self.output.method.trim().is_empty() {
            return Err(ConfigError::Invalid("method cannot be empty".to_string()));
        }
        match self.auth.auth_type.as_str() {
            "" | AUTH_TYPE_KEY | AUTH_TYPE_BASIC => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "auth.type {other:?} must be one of \"key\", \"basic\" or empty"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub method: String,
    pub ssl: TlsConfig,
    #[serde(deserialize_with = "deserialize_duration")]
    pub keep_alive: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    pub compress_level: u32,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            params: HashMap::new(),
            headers: HashMap::new(),
            method: "POST".to_string(),
            ssl: TlsConfig::default(),
            keep_alive: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
            compress_level: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// `key`, `basic`, or empty for no authentication.
    #[serde(rename = "type")]
    pub auth_type: String,
    pub property: HashMap<String, String>,
}

impl AuthConfig {
    /// Statically configured access key. When set, the credential file is not watched.
    #[must_use]
    pub fn access_key(&self) -> Option<&str> {
        self.property
            .get(PROPERTY_ACCESS_KEY)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub init: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Where the cluster access key is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub dir: PathBuf,
    pub file: String,
    /// Substring identifying the remount event that carries new content.
    pub marker: String,
}

impl CredentialConfig {
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CREDENTIAL_DIR),
            file: DEFAULT_CREDENTIAL_FILE.to_string(),
            marker: DEFAULT_CREDENTIAL_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM files with extra root certificates.
    pub certificate_authorities: Vec<PathBuf>,
    /// PEM client certificate, used together with `key`.
    pub certificate: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub verification_mode: VerificationMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    #[default]
    Full,
    /// Accept any server certificate.
    None,
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| D::Error::custom(format!("invalid duration {n}")))?;
            Duration::try_from_secs_f64(secs)
                .map_err(|e| D::Error::custom(format!("invalid duration {n}: {e}")))
        }
        Value::String(s) => {
            parse_duration(&s).ok_or_else(|| D::Error::custom(format!("invalid duration {s:?}")))
        }
        other => Err(D::Error::custom(format!(
            "expected a duration, got: {other}"
        ))),
    }
}

/// Parses a bare number of seconds or a humantime duration such as `500ms`, `30s`, `5m`
/// or `1h 30m`.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(input).ok()
}
