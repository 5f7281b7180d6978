//! latscale-metrics — latency samples from Prometheus.
//!
//! Asks Prometheus what share of a workload's requests finished under a
//! fixed latency bound over a trailing window, and turns the answer into a
//! [`LatencySample`](latscale_core::LatencySample). Every failure mode
//! (transport, non-success status, empty result, non-fraction value)
//! collapses to `Unavailable`; the caller never sees an error.
//!
//! # Query
//!
//! ```text
//! sum(rate(<metric>_bucket{le="<bound>",<sel>}[<window>]))
//!   /
//! sum(rate(<metric>_count{<sel>}[<window>]))
//! ```

pub mod client;
pub mod error;
pub mod query;
pub mod response;

pub use client::{MetricsClient, PrometheusClient};
pub use error::{MetricsError, MetricsResult};
pub use query::LatencyQuery;
pub use response::parse_value;
