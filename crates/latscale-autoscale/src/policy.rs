//! Threshold policy: latency sample → scale direction.

use latscale_core::{LatencySample, ScaleDecision, Thresholds};

/// Decide a direction from a sample and a pair of thresholds.
///
/// `high` is checked first, so a sample at or below `high` scales up even
/// when thresholds are misordered. Use [`ScalingPolicy`] to get validated
/// thresholds.
pub fn decide(sample: LatencySample, high: f64, low: f64) -> ScaleDecision {
    let Some(ratio) = sample.ratio() else {
        return ScaleDecision::NoOp;
    };

    if ratio <= high {
        ScaleDecision::ScaleUp
    } else if ratio >= low {
        ScaleDecision::ScaleDown
    } else {
        ScaleDecision::NoOp
    }
}

/// [`decide`] bound to validated thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScalingPolicy {
    thresholds: Thresholds,
}

impl ScalingPolicy {
    /// Policy over already-validated thresholds.
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// The thresholds this policy decides against.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Direction for one sample; see [`decide`].
    pub fn decide(&self, sample: LatencySample) -> ScaleDecision {
        decide(sample, self.thresholds.high(), self.thresholds.low())
    }
}
