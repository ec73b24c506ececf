//! Consumer settings and process-wide initialization.
//!
//! Settings deserialize from whatever configuration source the host
//! application uses; field names follow the established configuration
//! surface (`consumerGroup`, `kinesisUrl`, ...). Construction is cheap
//! and infallible; [`ConsumerSettings::validate`] is the fatal gate.

use crate::checkpoint::CheckpointConfig;
use crate::error::ConfigError;
use crate::types::{
    CheckpointStrategy, InitialPosition, MetricsDriver, MetricsLevel, RetrievalStrategy,
};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Environment toggle the AWS SDKs consult for CBOR wire encoding.
const CBOR_DISABLED_VAR: &str = "AWS_CBOR_DISABLED";

/// Global settings shared by every stream of this consumer process.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerSettings {
    /// Logical identity shared by all worker replicas of this consumer.
    pub consumer_group: String,
    /// Cloud region identifier.
    pub region: String,
    /// Endpoint override for the stream service, e.g. a local emulator.
    #[serde(default)]
    pub kinesis_url: Option<String>,
    /// Lease-store addressing and capacities.
    #[serde(default)]
    pub dynamo_db_settings: DynamoDbSettings,
    /// Turn off CBOR wire encoding in the underlying SDK, process-wide.
    #[serde(default)]
    pub disable_cbor: bool,
    /// Checkpointing policy applied to every stream.
    #[serde(default)]
    pub checkpointing: CheckpointSettings,
    /// Per-stream settings.
    #[serde(default)]
    pub streams: Vec<StreamSettings>,
}

impl ConsumerSettings {
    /// Reject settings a worker cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consumer_group.trim().is_empty() {
            return Err(ConfigError::MissingSetting("consumerGroup"));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingSetting("region"));
        }
        for stream in &self.streams {
            if stream.name.trim().is_empty() {
                return Err(ConfigError::MissingSetting("streams.name"));
            }
        }
        if self.dynamo_db_settings.lease_table_read_capacity < 1 {
            return Err(ConfigError::InvalidSetting {
                key: "dynamoDbSettings.leaseTableReadCapacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dynamo_db_settings.lease_table_write_capacity < 1 {
            return Err(ConfigError::InvalidSetting {
                key: "dynamoDbSettings.leaseTableWriteCapacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Settings for one stream, or the defaults when it is not configured.
    pub fn stream(&self, name: &str) -> StreamSettings {
        self.streams
            .iter()
            .find(|stream| stream.name == name)
            .cloned()
            .unwrap_or_else(|| StreamSettings::named(name))
    }
}

/// Lease-store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamoDbSettings {
    /// Endpoint override for the lease store.
    #[serde(default)]
    pub url: Option<String>,
    /// Initial provisioned read capacity of the lease table.
    #[serde(default = "default_capacity")]
    pub lease_table_read_capacity: i64,
    /// Initial provisioned write capacity of the lease table.
    #[serde(default = "default_capacity")]
    pub lease_table_write_capacity: i64,
}

fn default_capacity() -> i64 {
    1
}

impl Default for DynamoDbSettings {
    fn default() -> Self {
        Self {
            url: None,
            lease_table_read_capacity: default_capacity(),
            lease_table_write_capacity: default_capacity(),
        }
    }
}

/// Checkpointing policy as it appears in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSettings {
    #[serde(default)]
    pub strategy: CheckpointStrategy,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_millis")]
    pub backoff_millis: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_millis() -> u64 {
    1_000
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            strategy: CheckpointStrategy::default(),
            max_retries: default_max_retries(),
            backoff_millis: default_backoff_millis(),
        }
    }
}

impl CheckpointSettings {
    /// Convert into the runtime checkpoint configuration.
    pub fn to_config(&self) -> CheckpointConfig {
        CheckpointConfig::new()
            .with_strategy(self.strategy)
            .with_max_retries(self.max_retries)
            .with_backoff(Duration::from_millis(self.backoff_millis))
    }
}

/// Settings for one consumed stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    /// Name of the stream.
    pub name: String,
    #[serde(default)]
    pub retrieval_strategy: RetrievalStrategy,
    #[serde(default)]
    pub initial_position_in_stream: InitialPosition,
    #[serde(default)]
    pub metrics_level: MetricsLevel,
    #[serde(default)]
    pub metrics_driver: MetricsDriver,
    /// Role to assume for retrieval credentials, if any.
    #[serde(default)]
    pub role_arn: Option<String>,
}

impl StreamSettings {
    /// Default settings for a stream that was not explicitly configured.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            retrieval_strategy: RetrievalStrategy::default(),
            initial_position_in_stream: InitialPosition::default(),
            metrics_level: MetricsLevel::default(),
            metrics_driver: MetricsDriver::default(),
            role_arn: None,
        }
    }
}

static CBOR_TOGGLE: OnceLock<bool> = OnceLock::new();

/// Disable CBOR wire encoding in the underlying SDK, process-wide.
///
/// This mutates process environment and therefore runs once; later calls
/// are no-ops. Call it from program bootstrap, before any SDK client is
/// built. Returns whether this call applied the toggle.
pub fn disable_cbor_encoding() -> bool {
    let mut applied = false;
    CBOR_TOGGLE.get_or_init(|| {
        if let Ok(existing) = std::env::var(CBOR_DISABLED_VAR) {
            if existing != "true" {
                warn!(
                    value = %existing,
                    "overriding externally set {CBOR_DISABLED_VAR}"
                );
            }
        }
        // Safety: runs at most once, behind the OnceLock, during
        // bootstrap before any other thread reads or writes the
        // environment.
        unsafe {
            std::env::set_var(CBOR_DISABLED_VAR, "true");
        }
        applied = true;
        true
    });
    applied
}
