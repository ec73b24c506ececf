//! Metrics sinks and executor instrumentation.
//!
//! The crate records through the `metrics` facade; the host decides what
//! backs it. The customizer picks a [`MetricsSink`] per stream from the
//! configured driver and hands it to the scheduler's metrics config.

use metrics_exporter_prometheus::PrometheusHandle;
use std::fmt;

/// Destination for the scheduler's own metrics.
#[derive(Clone, Default)]
pub enum MetricsSink {
    /// Leave whatever the scheduler ships with untouched.
    #[default]
    Default,
    /// Discard everything.
    Null,
    /// Emit metrics as structured log lines.
    Logging,
    /// Bind to an installed Prometheus recorder.
    Registry(PrometheusHandle),
}

impl MetricsSink {
    /// Whether metrics are effectively discarded.
    pub fn is_null(&self) -> bool {
        matches!(self, MetricsSink::Null)
    }
}

impl fmt::Debug for MetricsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsSink::Default => write!(f, "Default"),
            MetricsSink::Null => write!(f, "Null"),
            MetricsSink::Logging => write!(f, "Logging"),
            MetricsSink::Registry(_) => write!(f, "Registry"),
        }
    }
}

/// Gauge set for one of the scheduler's internal executors.
///
/// The hosting runtime owns the thread pools; it reports their state
/// here and the monitor publishes it through the facade. Installed by
/// the customizer whenever a metrics registry is available, so pool
/// saturation shows up before it turns into lease churn.
#[derive(Debug, Clone)]
pub struct ExecutorMonitor {
    component: &'static str,
    stream: String,
}

impl ExecutorMonitor {
    /// Create a monitor labeled with the owning component and stream.
    pub fn new(component: &'static str, stream: impl Into<String>) -> Self {
        Self {
            component,
            stream: stream.into(),
        }
    }

    /// Report the executor's queued task count.
    pub fn queue_depth(&self, depth: usize) {
        metrics::gauge!(
            "kinesis_consumer_executor_queue_depth",
            "component" => self.component,
            "stream" => self.stream.clone()
        )
        .set(depth as f64);
    }

    /// Report the executor's active worker count.
    pub fn active_workers(&self, active: usize) {
        metrics::gauge!(
            "kinesis_consumer_executor_active_workers",
            "component" => self.component,
            "stream" => self.stream.clone()
        )
        .set(active as f64);
    }
}
