//! latscale-core — shared domain types for the latscale controller.
//!
//! Holds the values that flow between the leaf clients and the control
//! loop (`WorkloadRef`, `Workload`, `LatencySample`, `ScaleDecision`),
//! plus the validated controller configuration.
//!
//! # Data flow
//!
//! ```text
//! OrchestrationClient ─list─▶ Workload { WorkloadRef, replicas }
//! MetricsClient ─sample─▶ LatencySample::{Ratio, Unavailable}
//! ScalingPolicy ─decide─▶ ScaleDecision::{ScaleUp, ScaleDown, NoOp}
//! ```

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{
    ControllerConfig, DEFAULT_NAMESPACE, DEFAULT_OWN_NAME, MetricsConfig, OrchestratorConfig,
    Thresholds,
};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
