//! Controller configuration.
//!
//! Values are sourced by the daemon (flags and environment) and passed
//! into constructors explicitly. `ControllerConfig::validate` is the single
//! gate the daemon runs before it starts the loop.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Namespace managed when none is configured.
pub const DEFAULT_NAMESPACE: &str = "pycont";
/// Deployment name of the autoscaler itself when none is configured.
pub const DEFAULT_OWN_NAME: &str = "pycont-operator";
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.8;
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.95;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Latency thresholds with a dead band between them.
///
/// A sample at or below `high` means too few fast requests (scale up); at or
/// above `low` means plenty of headroom (scale down). `high < low` always
/// holds for a constructed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    high: f64,
    low: f64,
}

impl Thresholds {
    pub fn new(high: f64, low: f64) -> ConfigResult<Self> {
        check_fraction("high", high)?;
        check_fraction("low", low)?;
        if high >= low {
            return Err(ConfigError::ThresholdOrder { high, low });
        }
        Ok(Self { high, low })
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            low: DEFAULT_LOW_THRESHOLD,
        }
    }
}

fn check_fraction(name: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdRange { name, value })
    }
}

/// Where and how to query the latency ratio.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Base URL of the Prometheus server, e.g. `http://prometheus:9090`.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Histogram base name; `_bucket` and `_count` are appended.
    pub metric: String,
    /// Latency bound in seconds (the `le` bucket).
    pub latency_bound: f64,
    /// Trailing window for `rate()`.
    pub window: Duration,
    /// Label carrying the workload name.
    pub workload_label: String,
    /// Label carrying the namespace, if the series have one.
    pub namespace_label: Option<String>,
    pub timeout: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9090".to_string(),
            username: String::new(),
            password: String::new(),
            metric: "request_latency".to_string(),
            latency_bound: 0.5,
            window: Duration::from_secs(300),
            workload_label: "job".to_string(),
            namespace_label: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl MetricsConfig {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_url(&self.endpoint)?;
        if self.metric.trim().is_empty() {
            return Err(ConfigError::Empty("latency metric"));
        }
        if self.workload_label.trim().is_empty() {
            return Err(ConfigError::Empty("workload label"));
        }
        if matches!(&self.namespace_label, Some(l) if l.trim().is_empty()) {
            return Err(ConfigError::Empty("namespace label"));
        }
        if !(self.latency_bound.is_finite() && self.latency_bound > 0.0) {
            return Err(ConfigError::InvalidLatencyBound(self.latency_bound));
        }
        if self.window.is_zero() {
            return Err(ConfigError::NonPositiveDuration("latency window"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration("metrics request timeout"));
        }
        Ok(())
    }
}

/// How to reach the orchestration API.
///
/// With no `api_server` the client uses in-cluster service-account
/// discovery.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub api_server: Option<String>,
    pub token_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token_file: None,
            ca_file: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.api_server {
            check_url(url)?;
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration("orchestrator request timeout"));
        }
        Ok(())
    }
}

/// Everything the controller needs to run.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace whose workloads are managed.
    pub namespace: String,
    /// Name of the controller's own workload; never scaled.
    pub own_name: String,
    pub thresholds: Thresholds,
    pub cooldown: Duration,
    pub interval: Duration,
    pub metrics: MetricsConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            own_name: DEFAULT_OWN_NAME.to_string(),
            thresholds: Thresholds::default(),
            cooldown: DEFAULT_COOLDOWN,
            interval: DEFAULT_INTERVAL,
            metrics: MetricsConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Empty("namespace"));
        }
        if self.own_name.trim().is_empty() {
            return Err(ConfigError::Empty("own workload name"));
        }
        if self.cooldown.is_zero() {
            return Err(ConfigError::NonPositiveDuration("cooldown"));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::NonPositiveDuration("tick interval"));
        }
        self.metrics.validate()?;
        self.orchestrator.validate()?;
        Ok(())
    }
}

fn check_url(url: &str) -> ConfigResult<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| ConfigError::InvalidEndpoint {
            url: url.to_string(),
            reason: "scheme must be http or https".to_string(),
        })?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ConfigError::InvalidEndpoint {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}
