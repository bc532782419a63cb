//! Service configuration.
//!
//! Loaded once at startup from an optional YAML file, then overridden from
//! the environment, then validated. Every field has a default, so an empty
//! file (or no file) yields a runnable in-memory service.
//!
//! ```yaml
//! listen: "0.0.0.0:8080"
//! store:
//!   backend: filesystem   # memory | filesystem | s3
//!   root: ./data
//! partitions:
//!   iot: iot-data/
//!   weather: shmi-data/
//! fetch:
//!   concurrency: 8
//!   timeout_ms: 5000
//! auth:
//!   compare: { username: alice, password: secret }
//!   records: { username: bob, password: secret }
//! weather:
//!   station: "72420"
//! ingest:
//!   schedule: "5 * * * *"
//! mqtt:
//!   host: broker.local
//!   topic: "+/data_pub"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::gateway::auth::Credentials;
use crate::ingest;
use crate::iot::MqttConfig;
use crate::observation::{IOT_PARTITION, WEATHER_PARTITION};
use crate::store::{FetchConfig, FsStore, MemoryStore, ObjectStore, StoreError};
use crate::weather::WeatherConfig;

/// Errors from loading or applying configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Filesystem,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory for the filesystem backend.
    pub root: PathBuf,
    /// Bucket for the s3 backend.
    pub bucket: Option<String>,
    /// AWS region; the SDK's default chain applies when unset.
    pub region: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            root: PathBuf::from("./data"),
            bucket: None,
            region: None,
        }
    }
}

/// Key prefixes of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub iot: String,
    pub weather: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            iot: IOT_PARTITION.to_string(),
            weather: WEATHER_PARTITION.to_string(),
        }
    }
}

/// Independent credential pairs. Unset means the endpoint rejects everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub compare: Option<Credentials>,
    pub records: Option<Credentials>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Cron expression (5 or 6 fields). Unset disables scheduled ingestion.
    pub schedule: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen: String,
    pub store: StoreConfig,
    pub partitions: PartitionConfig,
    pub fetch: FetchConfig,
    pub auth: AuthConfig,
    pub weather: WeatherConfig,
    pub ingest: IngestConfig,
    pub mqtt: Option<MqttConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            store: StoreConfig::default(),
            partitions: PartitionConfig::default(),
            fetch: FetchConfig::default(),
            auth: AuthConfig::default(),
            weather: WeatherConfig::default(),
            ingest: IngestConfig::default(),
            mqtt: None,
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from YAML text.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply the deployment environment variables.
    ///
    /// `aws_region`, `s3_bucket_name`, `allowedUser`/`allowedPassword` for
    /// compare, `basic_auth_username`/`basic_auth_password` for records.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup("aws_region") {
            self.store.region = Some(region);
        }
        if let Some(bucket) = lookup("s3_bucket_name") {
            self.store.bucket = Some(bucket);
            if cfg!(feature = "s3") {
                self.store.backend = StoreBackend::S3;
            }
        }
        override_credentials(
            &mut self.auth.compare,
            lookup("allowedUser"),
            lookup("allowedPassword"),
        );
        override_credentials(
            &mut self.auth.records,
            lookup("basic_auth_username"),
            lookup("basic_auth_password"),
        );
    }

    /// Reject settings that cannot run.
    pub fn validate(&self) -> Result<()> {
        let partitions = &self.partitions;
        if partitions.iot.is_empty() || partitions.weather.is_empty() {
            return Err(ConfigError::Invalid("partition prefixes must not be empty".into()));
        }
        if partitions.iot.starts_with(&partitions.weather)
            || partitions.weather.starts_with(&partitions.iot)
        {
            return Err(ConfigError::Invalid(format!(
                "partitions '{}' and '{}' overlap",
                partitions.iot, partitions.weather
            )));
        }
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Invalid("fetch.concurrency must be at least 1".into()));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_ms must be at least 1".into()));
        }
        if self.store.backend == StoreBackend::S3 && self.store.bucket.is_none() {
            return Err(ConfigError::Invalid(
                "store.bucket (or s3_bucket_name) is required for the s3 backend".into(),
            ));
        }
        if let Some(schedule) = &self.ingest.schedule {
            ingest::next_run_after(schedule, chrono::Utc::now().timestamp())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Open the configured object store backend.
    pub async fn build_store(&self) -> Result<Arc<dyn ObjectStore>> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Filesystem => Ok(Arc::new(FsStore::open(self.store.root.clone())?)),
            StoreBackend::S3 => self.build_s3().await,
        }
    }

    #[cfg(feature = "s3")]
    async fn build_s3(&self) -> Result<Arc<dyn ObjectStore>> {
        let bucket = self
            .store
            .bucket
            .clone()
            .ok_or_else(|| ConfigError::Invalid("store.bucket is required for s3".into()))?;
        let store = crate::store::S3Store::connect(bucket, self.store.region.clone()).await;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "s3"))]
    async fn build_s3(&self) -> Result<Arc<dyn ObjectStore>> {
        Err(ConfigError::Invalid(
            "the s3 backend requires building with the `s3` feature".into(),
        ))
    }
}

fn override_credentials(
    slot: &mut Option<Credentials>,
    username: Option<String>,
    password: Option<String>,
) {
    if username.is_none() && password.is_none() {
        return;
    }
    let credentials = slot.get_or_insert_with(Credentials::default);
    if let Some(username) = username {
        credentials.username = username;
    }
    if let Some(password) = password {
        credentials.password = password;
    }
}
