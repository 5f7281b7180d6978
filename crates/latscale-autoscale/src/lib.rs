//! latscale-autoscale — latency-driven replica control.
//!
//! Every tick the control loop lists the workloads of one namespace,
//! samples each workload's latency ratio, and moves it by at most one
//! replica. A per-workload cooldown window keeps two committed actions on
//! the same workload at least `cooldown` apart.
//!
//! # Scaling Algorithm
//!
//! ```text
//! sample = share of requests faster than the bound over the window
//!
//! if sample is unavailable:   NoOp      // never act on missing data
//! if sample <= high:          ScaleUp   // too many slow requests
//! if sample >= low:           ScaleDown // plenty of headroom
//! otherwise:                  NoOp      // dead band
//!
//! target = max(current + delta, 1), delta ∈ {+1, -1}
//! ```
//!
//! Eligibility is checked before sampling; the cooldown clock is only
//! committed after a patch succeeds, so NoOp decisions never consume it.

pub mod controller;
pub mod cooldown;
pub mod policy;

pub use controller::{ControlLoop, LoopSettings, Outcome, TickReport, WorkloadReport};
pub use cooldown::CooldownTracker;
pub use policy::{ScalingPolicy, decide};
