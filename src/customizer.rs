//! Per-stream client configuration.
//!
//! One [`ClientCustomizerFactory`] holds the process-wide settings and
//! produces a [`StreamClientCustomizer`] per consumed stream. The
//! customizer owns everything the hosting scheduler needs to come up for
//! that stream: coordination identity, retrieval specifics, lease-table
//! capacities, metrics wiring, and the AWS client configurations.

use crate::checkpoint::CheckpointConfig;
use crate::config::{disable_cbor_encoding, ConsumerSettings, StreamSettings};
use crate::error::ConfigError;
use crate::metrics::{ExecutorMonitor, MetricsSink};
use crate::scheduler::{
    CoordinatorConfig, HttpMode, LeaseManagementConfig, MetricsConfig, RetrievalConfig,
    RetrievalMode,
};
use crate::types::{MetricsDriver, RetrievalStrategy};
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::SharedCredentialsProvider;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Produces per-stream customizers from the process-wide settings.
///
/// Create one per process. Construction validates the settings and runs
/// the one-shot CBOR toggle when asked for, so misconfiguration fails
/// before any scheduler starts.
pub struct ClientCustomizerFactory {
    settings: ConsumerSettings,
    prometheus: Option<PrometheusHandle>,
}

impl ClientCustomizerFactory {
    /// Validate the settings and build the factory.
    pub fn new(settings: ConsumerSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        if settings.disable_cbor && disable_cbor_encoding() {
            info!("disabled CBOR wire encoding for this process");
        }
        Ok(Self {
            settings,
            prometheus: None,
        })
    }

    /// Attach an installed Prometheus recorder handle.
    ///
    /// Enables the `PROMETHEUS` metrics driver and executor
    /// instrumentation for the customizers this factory produces.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Build the customizer for one stream.
    ///
    /// Streams absent from the settings get defaults: fan-out retrieval
    /// from `LATEST` with summary metrics through the default sink.
    pub fn customizer(&self, stream: &str) -> StreamClientCustomizer {
        StreamClientCustomizer::new(
            self.settings.clone(),
            self.settings.stream(stream),
            self.prometheus.clone(),
        )
    }
}

/// Client configuration for one stream.
///
/// The worker identifier is computed once at construction and stable for
/// the customizer's life; two customizers for the same stream contest
/// leases as distinct workers.
pub struct StreamClientCustomizer {
    settings: ConsumerSettings,
    stream: StreamSettings,
    application_name: String,
    worker_id: String,
    prometheus: Option<PrometheusHandle>,
}

impl StreamClientCustomizer {
    fn new(
        settings: ConsumerSettings,
        stream: StreamSettings,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        let application_name = format!("{}_{}", settings.consumer_group, stream.name);
        let worker_id = format!("{}:{}", canonical_host(), Uuid::new_v4());
        Self {
            settings,
            stream,
            application_name,
            worker_id,
            prometheus,
        }
    }

    /// The coordination key all replicas of this consumer agree on.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// This worker's lease-ownership identity.
    pub fn worker_identifier(&self) -> &str {
        &self.worker_id
    }

    /// Checkpointing policy for processors of this stream.
    pub fn checkpoint_config(&self) -> CheckpointConfig {
        self.settings.checkpointing.to_config()
    }

    /// Set the initial position and the retrieval mechanism.
    pub fn customize_retrieval(&self, config: &mut RetrievalConfig) {
        config.initial_position = self.stream.initial_position_in_stream;
        config.mode = match self.stream.retrieval_strategy {
            RetrievalStrategy::Fanout => RetrievalMode::Fanout,
            // Polling multiplexes badly over HTTP/2; pin the client.
            RetrievalStrategy::Polling => RetrievalMode::Polling {
                http: HttpMode::Http1Only,
            },
        };
    }

    /// Apply lease-table capacities and executor instrumentation.
    pub fn customize_lease_management(&self, config: &mut LeaseManagementConfig) {
        config.read_capacity = self.settings.dynamo_db_settings.lease_table_read_capacity;
        config.write_capacity = self.settings.dynamo_db_settings.lease_table_write_capacity;
        if self.prometheus.is_some() {
            config.executor.monitor =
                Some(ExecutorMonitor::new("lease-management", &self.stream.name));
        }
    }

    /// Instrument the coordinator executor when a registry is available.
    pub fn customize_coordinator(&self, config: &mut CoordinatorConfig) {
        if self.prometheus.is_some() {
            config.executor.monitor = Some(ExecutorMonitor::new("coordinator", &self.stream.name));
        }
    }

    /// Set the metrics level and select the sink for the configured driver.
    pub fn customize_metrics(&self, config: &mut MetricsConfig) {
        config.level = self.stream.metrics_level;
        match self.stream.metrics_driver {
            MetricsDriver::Default => {}
            MetricsDriver::None => config.sink = MetricsSink::Null,
            MetricsDriver::Logging => config.sink = MetricsSink::Logging,
            MetricsDriver::Prometheus => match &self.prometheus {
                Some(handle) => config.sink = MetricsSink::Registry(handle.clone()),
                None => {
                    warn!(
                        stream = %self.stream.name,
                        "PROMETHEUS metrics driver configured but no recorder is installed, discarding metrics"
                    );
                    config.sink = MetricsSink::Null;
                }
            },
        }
    }

    /// Client configuration for the stream service.
    ///
    /// The HTTP-version pin for polling retrieval travels with
    /// [`RetrievalConfig`]; the scheduler builds its retrieval client
    /// from both.
    pub async fn kinesis_client_config(&self) -> aws_sdk_kinesis::Config {
        let mut builder = aws_sdk_kinesis::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(self.region())
            .credentials_provider(self.credentials().await);
        if let Some(url) = &self.settings.kinesis_url {
            builder = builder.endpoint_url(url);
        }
        builder.build()
    }

    /// Client configuration for the lease store.
    pub async fn dynamodb_client_config(&self) -> aws_sdk_dynamodb::Config {
        let mut builder = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(self.region())
            .credentials_provider(self.credentials().await);
        if let Some(url) = &self.settings.dynamo_db_settings.url {
            builder = builder.endpoint_url(url);
        }
        builder.build()
    }

    /// Client configuration for the metrics service.
    pub async fn cloudwatch_client_config(&self) -> aws_sdk_cloudwatch::Config {
        aws_sdk_cloudwatch::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(self.region())
            .credentials_provider(self.credentials().await)
            .build()
    }

    /// Resolve credentials for this stream.
    ///
    /// A declared `roleArn` is assumed through STS; otherwise the default
    /// provider chain applies.
    async fn credentials(&self) -> SharedCredentialsProvider {
        match &self.stream.role_arn {
            Some(role_arn) => {
                let provider = AssumeRoleProvider::builder(role_arn)
                    .region(self.region())
                    .session_name(self.application_name.clone())
                    .build()
                    .await;
                SharedCredentialsProvider::new(provider)
            }
            None => {
                let chain = DefaultCredentialsChain::builder()
                    .region(self.region())
                    .build()
                    .await;
                SharedCredentialsProvider::new(chain)
            }
        }
    }

    fn region(&self) -> Region {
        Region::new(self.settings.region.clone())
    }
}

fn canonical_host() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}
