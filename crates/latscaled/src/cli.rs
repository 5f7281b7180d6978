//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use latscale_core::{
    ConfigResult, ControllerConfig, DEFAULT_NAMESPACE, DEFAULT_OWN_NAME, MetricsConfig,
    OrchestratorConfig, Thresholds, parse_duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "latscaled", version, about = "Latency-driven autoscaler")]
pub struct Cli {
    /// Namespace whose workloads are managed.
    #[arg(long, env = "CURRENT_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Name of the autoscaler's own Deployment; never scaled.
    #[arg(long, env = "CURRENT_NAME", default_value = DEFAULT_OWN_NAME)]
    pub own_name: String,

    /// Prometheus base URL.
    #[arg(long, env = "PROMETHEUS_URL", default_value = "http://localhost:9090")]
    pub prometheus_url: String,

    #[arg(long, env = "PROMETHEUS_USERNAME", default_value = "")]
    pub prometheus_username: String,

    #[arg(long, env = "PROMETHEUS_PASSWORD", default_value = "", hide_env_values = true)]
    pub prometheus_password: String,

    /// Latency histogram name (without `_bucket` / `_count`).
    #[arg(long, env = "LATENCY_METRIC", default_value = "request_latency")]
    pub latency_metric: String,

    /// Latency bound in seconds; selects the `le` bucket.
    #[arg(long, env = "LATENCY_BOUND", default_value_t = 0.5)]
    pub latency_bound: f64,

    /// Rate window, e.g. `5m`.
    #[arg(long, env = "LATENCY_WINDOW", default_value = "5m", value_parser = parse_duration)]
    pub latency_window: Duration,

    /// Series label holding the workload name.
    #[arg(long, env = "WORKLOAD_LABEL", default_value = "job")]
    pub workload_label: String,

    /// Series label holding the namespace, if any.
    #[arg(long, env = "NAMESPACE_LABEL")]
    pub namespace_label: Option<String>,

    /// Scale up when the fast-request share is at or below this.
    #[arg(long, env = "HIGH_THRESHOLD", default_value_t = 0.8)]
    pub high_threshold: f64,

    /// Scale down when the fast-request share is at or above this.
    #[arg(long, env = "LOW_THRESHOLD", default_value_t = 0.95)]
    pub low_threshold: f64,

    /// Minimum time between two actions on one workload.
    #[arg(long, env = "COOLDOWN", default_value = "60s", value_parser = parse_duration)]
    pub cooldown: Duration,

    /// Time between ticks.
    #[arg(long, env = "TICK_INTERVAL", default_value = "5s", value_parser = parse_duration)]
    pub interval: Duration,

    /// Per-request timeout for Prometheus and the API server.
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub request_timeout: Duration,

    /// API server URL. Unset means in-cluster discovery, then kubeconfig.
    #[arg(long, env = "KUBE_API_SERVER")]
    pub api_server: Option<String>,

    /// Bearer token file for the API server.
    #[arg(long, env = "KUBE_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// CA bundle (PEM) for the API server.
    #[arg(long, env = "KUBE_CA_FILE")]
    pub ca_file: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Assemble and validate the controller configuration.
    pub fn into_config(self) -> ConfigResult<ControllerConfig> {
        let config = ControllerConfig {
            namespace: self.namespace,
            own_name: self.own_name,
            thresholds: Thresholds::new(self.high_threshold, self.low_threshold)?,
            cooldown: self.cooldown,
            interval: self.interval,
            metrics: MetricsConfig {
                endpoint: self.prometheus_url,
                username: self.prometheus_username,
                password: self.prometheus_password,
                metric: self.latency_metric,
                latency_bound: self.latency_bound,
                window: self.latency_window,
                workload_label: self.workload_label,
                namespace_label: self.namespace_label,
                timeout: self.request_timeout,
            },
            orchestrator: OrchestratorConfig {
                api_server: self.api_server,
                token_file: self.token_file,
                ca_file: self.ca_file,
                timeout: self.request_timeout,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latscale_core::ConfigError;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["latscaled"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--namespace",
            "staging",
            "--own-name",
            "operator",
            "--prometheus-url",
            "https://prom.example:9090",
            "--high-threshold",
            "0.7",
            "--low-threshold",
            "0.9",
            "--cooldown",
            "2m",
            "--interval",
            "1500ms",
            "--request-timeout",
            "3s",
            "--namespace-label",
            "kubernetes_namespace",
            "--api-server",
            "http://127.0.0.1:8001",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.namespace, "staging");
        assert_eq!(config.own_name, "operator");
        assert_eq!(config.thresholds.high(), 0.7);
        assert_eq!(config.thresholds.low(), 0.9);
        assert_eq!(config.cooldown, Duration::from_secs(120));
        assert_eq!(config.interval, Duration::from_millis(1500));
        assert_eq!(config.metrics.endpoint, "https://prom.example:9090");
        assert_eq!(config.metrics.timeout, Duration::from_secs(3));
        assert_eq!(config.orchestrator.timeout, Duration::from_secs(3));
        assert_eq!(config.metrics.namespace_label.as_deref(), Some("kubernetes_namespace"));
        assert_eq!(config.orchestrator.api_server.as_deref(), Some("http://127.0.0.1:8001"));
    }

    #[test]
    fn misordered_thresholds_are_rejected() {
        let err = parse(&["--high-threshold", "0.95", "--low-threshold", "0.8"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOrder { .. }));
    }

    #[test]
    fn bad_duration_fails_to_parse() {
        assert!(Cli::try_parse_from(["latscaled", "--cooldown", "soon"]).is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = parse(&["--interval", "0s"]).into_config().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveDuration("tick interval"));
    }

    #[test]
    fn log_format_accepts_json() {
        assert_eq!(parse(&["--log-format", "json"]).log_format, LogFormat::Json);
    }
}
