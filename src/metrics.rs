//! Prometheus metrics for plugin lifecycle transitions, labelled by plugin type.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};

/// Configuration for plugin metrics collection.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Prefix of every metric name.
    pub prefix: String,
    /// Whether to record load durations.
    pub detailed_timing: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: "plugin_registry".to_string(),
            detailed_timing: true,
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metric prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable or disable load duration histograms.
    pub fn with_detailed_timing(mut self, enabled: bool) -> Self {
        self.detailed_timing = enabled;
        self
    }
}

/// A counted lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stored in a registry.
    Install,
    /// Started.
    Load,
    /// Shut down.
    Unload,
}

impl Transition {
    fn label(self) -> &'static str {
        match self {
            Transition::Install => "install",
            Transition::Load => "load",
            Transition::Unload => "unload",
        }
    }
}

fn metrics_err(e: prometheus::Error) -> Error {
    Error::Metrics(e.to_string())
}

/// Lifecycle counters and load timings per plugin type.
pub struct PluginMetrics {
    config: MetricsConfig,
    registry: Registry,
    transitions: IntCounterVec,
    failures: IntCounterVec,
    load_duration: HistogramVec,
}

impl PluginMetrics {
    /// Create a collector with its own Prometheus registry.
    pub fn new(config: MetricsConfig) -> Result<Self> {
        let transitions = IntCounterVec::new(
            Opts::new(
                format!("{}_transitions_total", config.prefix),
                "Completed plugin lifecycle transitions",
            ),
            &["kind", "transition"],
        )
        .map_err(metrics_err)?;

        let failures = IntCounterVec::new(
            Opts::new(
                format!("{}_failures_total", config.prefix),
                "Failed plugin lifecycle transitions",
            ),
            &["kind"],
        )
        .map_err(metrics_err)?;

        let load_duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{}_load_duration_seconds", config.prefix),
                "Time spent in plugin start-up hooks and load notifications",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["kind"],
        )
        .map_err(metrics_err)?;

        let registry = Registry::new();
        registry
            .register(Box::new(transitions.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(failures.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(load_duration.clone()))
            .map_err(metrics_err)?;

        Ok(Self {
            config,
            registry,
            transitions,
            failures,
            load_duration,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a completed transition of a plugin of type `kind`.
    pub fn record(&self, kind: &str, transition: Transition) {
        self.transitions
            .with_label_values(&[kind, transition.label()])
            .inc();
    }

    /// Count a load and, with detailed timing, observe how long it took.
    pub fn record_load(&self, kind: &str, duration_secs: f64) {
        self.record(kind, Transition::Load);
        if self.config.detailed_timing {
            self.load_duration
                .with_label_values(&[kind])
                .observe(duration_secs);
        }
    }

    /// Count a failed transition.
    pub fn record_failure(&self, kind: &str) {
        self.failures.with_label_values(&[kind]).inc();
    }

    /// Completed transitions of one kind for plugins of type `kind`.
    pub fn transitions_total(&self, kind: &str, transition: Transition) -> u64 {
        self.transitions
            .with_label_values(&[kind, transition.label()])
            .get()
    }

    /// Failed transitions for plugins of type `kind`.
    pub fn failures_total(&self, kind: &str) -> u64 {
        self.failures.with_label_values(&[kind]).get()
    }

    /// Render all collected metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(metrics_err)?;
        String::from_utf8(buf).map_err(|e| Error::Metrics(e.to_string()))
    }
}

impl std::fmt::Debug for PluginMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMetrics")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
