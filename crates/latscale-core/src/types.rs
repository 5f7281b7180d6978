//! Domain types shared by the controller crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Replica counts never go below this value through a controller patch.
pub const MIN_REPLICAS: u32 = 1;

/// Identity of a managed workload: `{namespace}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Composite identity key, `{namespace}/{name}`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One entry of a namespace listing: a workload and its current replica count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub reference: WorkloadRef,
    pub replicas: u32,
}

impl Workload {
    pub fn new(reference: WorkloadRef, replicas: u32) -> Self {
        Self {
            reference,
            replicas,
        }
    }
}

/// Share of requests faster than the latency bound over the trailing window.
///
/// `Unavailable` is distinct from a ratio of zero: zero means every request
/// was slow, `Unavailable` means there was nothing to judge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencySample {
    Ratio(f64),
    Unavailable,
}

impl LatencySample {
    /// Build a sample from a raw ratio. NaN, infinities, and values outside
    /// `[0, 1]` are not fractions and become `Unavailable`.
    pub fn from_ratio(value: f64) -> Self {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            LatencySample::Ratio(value)
        } else {
            LatencySample::Unavailable
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            LatencySample::Ratio(v) => Some(*v),
            LatencySample::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, LatencySample::Ratio(_))
    }
}

impl fmt::Display for LatencySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatencySample::Ratio(v) => write!(f, "{v:.4}"),
            LatencySample::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Direction a workload should move this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleDecision {
    ScaleUp,
    ScaleDown,
    NoOp,
}

impl ScaleDecision {
    /// Replica delta applied by this decision: +1, -1, or 0.
    pub fn delta(self) -> i64 {
        match self {
            ScaleDecision::ScaleUp => 1,
            ScaleDecision::ScaleDown => -1,
            ScaleDecision::NoOp => 0,
        }
    }

    /// Target replica count for a workload currently at `current`,
    /// clamped so it never drops below [`MIN_REPLICAS`].
    pub fn target_replicas(self, current: u32) -> u32 {
        match self {
            ScaleDecision::ScaleUp => current.saturating_add(1).max(MIN_REPLICAS),
            ScaleDecision::ScaleDown => current.saturating_sub(1).max(MIN_REPLICAS),
            ScaleDecision::NoOp => current,
        }
    }
}

impl fmt::Display for ScaleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScaleDecision::ScaleUp => "scale-up",
            ScaleDecision::ScaleDown => "scale-down",
            ScaleDecision::NoOp => "no-op",
        };
        f.write_str(s)
    }
}
