//! PromQL latency-ratio query builder.

use std::time::Duration;

use latscale_core::{MetricsConfig, WorkloadRef};

/// Template for the per-workload latency ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyQuery {
    metric: String,
    bound: f64,
    window: Duration,
    workload_label: String,
    namespace_label: Option<String>,
}

impl LatencyQuery {
    pub fn new(metric: impl Into<String>, bound: f64, window: Duration) -> Self {
        Self {
            metric: metric.into(),
            bound,
            window,
            workload_label: "job".to_string(),
            namespace_label: None,
        }
    }

    pub fn with_workload_label(mut self, label: impl Into<String>) -> Self {
        self.workload_label = label.into();
        self
    }

    pub fn with_namespace_label(mut self, label: Option<String>) -> Self {
        self.namespace_label = label;
        self
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(&config.metric, config.latency_bound, config.window)
            .with_workload_label(&config.workload_label)
            .with_namespace_label(config.namespace_label.clone())
    }

    /// Render the PromQL expression for one workload.
    ///
    /// Numerator and denominator share the selector and window so the ratio
    /// is fast-rate over total-rate for the same series.
    pub fn render(&self, workload: &WorkloadRef) -> String {
        let mut selector = format!(
            "{}=\"{}\"",
            self.workload_label,
            escape_label_value(&workload.name)
        );
        if let Some(ns_label) = &self.namespace_label {
            selector.push_str(&format!(
                ",{}=\"{}\"",
                ns_label,
                escape_label_value(&workload.namespace)
            ));
        }

        let window = render_window(self.window);
        format!(
            "sum(rate({m}_bucket{{le=\"{le}\",{sel}}}[{w}])) / sum(rate({m}_count{{{sel}}}[{w}]))",
            m = self.metric,
            le = bucket_label(self.bound),
            sel = selector,
            w = window,
        )
    }
}

/// `le` label value for a bucket bound: always carries a fractional part
/// (`1.0`, `0.5`, `2.5`).
fn bucket_label(bound: f64) -> String {
    format!("{bound:?}")
}

fn render_window(window: Duration) -> String {
    if window.as_secs() == 0 || window.subsec_millis() != 0 {
        format!("{}ms", window.as_millis())
    } else {
        format!("{}s", window.as_secs())
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> WorkloadRef {
        WorkloadRef::new("pycont", "api")
    }

    #[test]
    fn default_query_shape() {
        let q = LatencyQuery::from_config(&MetricsConfig::default());
        assert_eq!(
            q.render(&api()),
            "sum(rate(request_latency_bucket{le=\"0.5\",job=\"api\"}[300s])) \
             / sum(rate(request_latency_count{job=\"api\"}[300s]))"
        );
    }

    #[test]
    fn namespace_label_is_added_to_both_sides() {
        let q = LatencyQuery::new("http_request_duration_seconds", 0.25, Duration::from_secs(60))
            .with_workload_label("app")
            .with_namespace_label(Some("namespace".to_string()));
        let rendered = q.render(&api());
        assert_eq!(
            rendered,
            "sum(rate(http_request_duration_seconds_bucket{le=\"0.25\",app=\"api\",namespace=\"pycont\"}[60s])) \
             / sum(rate(http_request_duration_seconds_count{app=\"api\",namespace=\"pycont\"}[60s]))"
        );
    }

    #[test]
    fn whole_bounds_keep_fraction() {
        assert_eq!(bucket_label(1.0), "1.0");
        assert_eq!(bucket_label(0.5), "0.5");
        assert_eq!(bucket_label(2.5), "2.5");
    }

    #[test]
    fn sub_second_windows_use_milliseconds() {
        assert_eq!(render_window(Duration::from_secs(300)), "300s");
        assert_eq!(render_window(Duration::from_millis(1500)), "1500ms");
        assert_eq!(render_window(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn label_values_are_escaped() {
        let w = WorkloadRef::new("ns", "we\"ird\\name");
        let rendered = LatencyQuery::from_config(&MetricsConfig::default()).render(&w);
        assert!(rendered.contains(r#"job="we\"ird\\name""#), "{rendered}");
    }
}
