//! Control loop — one namespace pass per tick.
//!
//! Lists workloads, gates each on its cooldown, samples latency, applies
//! the policy, and patches at most one replica of change. A failure on one
//! workload is logged and the pass moves on; a failed listing is logged and
//! retried on the next tick.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use latscale_core::{ControllerConfig, LatencySample, ScaleDecision, Workload, WorkloadRef};
use latscale_metrics::MetricsClient;
use latscale_orchestrator::{OrchestrationClient, OrchestrationResult};

use crate::cooldown::CooldownTracker;
use crate::policy::ScalingPolicy;

/// Loop parameters that are not part of the policy.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub namespace: String,
    /// Workload name of the controller itself; never scaled.
    pub own_name: String,
    pub cooldown: Duration,
    pub interval: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            own_name: config.own_name.clone(),
            cooldown: config.cooldown,
            interval: config.interval,
        }
    }
}

/// What happened to one workload during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The controller's own workload.
    SelfExcluded,
    /// Still inside the cooldown window; not sampled.
    CoolingDown { remaining: Duration },
    /// Sampled, and the policy chose no action.
    Held { sample: LatencySample },
    /// Scale-down requested at the replica floor; nothing sent.
    AtFloor { replicas: u32 },
    /// Scale-up requested at the largest representable count; nothing sent.
    AtCeiling { replicas: u32 },
    /// Patch accepted and cooldown committed.
    Scaled {
        decision: ScaleDecision,
        from: u32,
        to: u32,
    },
    /// Patch rejected; cooldown untouched.
    PatchFailed { target: u32, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadReport {
    pub workload: WorkloadRef,
    pub outcome: Outcome,
}

/// Result of one pass over the namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub workloads: Vec<WorkloadReport>,
    /// Workloads skipped because shutdown was requested mid-pass.
    pub abandoned: usize,
}

impl TickReport {
    pub fn outcome_of(&self, name: &str) -> Option<&Outcome> {
        self.workloads
            .iter()
            .find(|r| r.workload.name == name)
            .map(|r| &r.outcome)
    }

    pub fn scaled(&self) -> usize {
        self.workloads
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Scaled { .. }))
            .count()
    }
}

/// The autoscaler: owns the cooldown state and drives the clients.
pub struct ControlLoop<O, M> {
    orchestrator: O,
    metrics: M,
    policy: ScalingPolicy,
    cooldowns: CooldownTracker,
    settings: LoopSettings,
}

impl<O, M> ControlLoop<O, M>
where
    O: OrchestrationClient,
    M: MetricsClient,
{
    pub fn new(orchestrator: O, metrics: M, policy: ScalingPolicy, settings: LoopSettings) -> Self {
        Self {
            orchestrator,
            metrics,
            policy,
            cooldowns: CooldownTracker::new(),
            settings,
        }
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run a single pass over the namespace.
    ///
    /// Only a failed listing is returned as an error; per-workload failures
    /// are reported in the [`TickReport`].
    pub async fn tick(&mut self) -> OrchestrationResult<TickReport> {
        self.run_tick(None).await
    }

    async fn run_tick(
        &mut self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> OrchestrationResult<TickReport> {
        let workloads = self
            .orchestrator
            .list_workloads(&self.settings.namespace)
            .await?;
        debug!(
            namespace = %self.settings.namespace,
            count = workloads.len(),
            "checking workloads"
        );

        let mut report = TickReport::default();
        for (i, workload) in workloads.iter().enumerate() {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                report.abandoned = workloads.len() - i;
                info!(abandoned = report.abandoned, "shutdown requested, abandoning tick");
                break;
            }

            let outcome = self.process(workload).await;
            report.workloads.push(WorkloadReport {
                workload: workload.reference.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    async fn process(&mut self, workload: &Workload) -> Outcome {
        let target = &workload.reference;

        if target.name == self.settings.own_name {
            debug!(workload = %target, "ignoring own workload");
            return Outcome::SelfExcluded;
        }

        if let Some(remaining) =
            self.cooldowns
                .remaining(target, Instant::now(), self.settings.cooldown)
        {
            debug!(
                workload = %target,
                remaining_secs = remaining.as_secs(),
                "in cooldown, not scaling"
            );
            return Outcome::CoolingDown { remaining };
        }

        let sample = self.metrics.sample(target).await;
        let decision = self.policy.decide(sample);
        if decision == ScaleDecision::NoOp {
            debug!(workload = %target, %sample, "within thresholds");
            return Outcome::Held { sample };
        }

        let from = workload.replicas;
        let to = decision.target_replicas(from);
        match decision {
            ScaleDecision::ScaleDown if to >= from => {
                debug!(workload = %target, replicas = from, "at replica floor");
                return Outcome::AtFloor { replicas: from };
            }
            ScaleDecision::ScaleUp if to <= from => {
                debug!(workload = %target, replicas = from, "at replica ceiling");
                return Outcome::AtCeiling { replicas: from };
            }
            _ => {}
        }

        match self.orchestrator.patch_replicas(target, to).await {
            Ok(()) => {
                self.cooldowns.commit(target, Instant::now());
                info!(
                    workload = %target,
                    %decision,
                    %sample,
                    from,
                    to,
                    "scaled workload"
                );
                Outcome::Scaled { decision, from, to }
            }
            Err(e) => {
                warn!(
                    workload = %target,
                    %decision,
                    target_replicas = to,
                    error = %e,
                    "scaling action failed"
                );
                Outcome::PatchFailed {
                    target: to,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Tick every `interval` until `shutdown` flips to `true` (or its
    /// sender is dropped).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            namespace = %self.settings.namespace,
            own_name = %self.settings.own_name,
            interval_ms = self.settings.interval.as_millis() as u64,
            cooldown_secs = self.settings.cooldown.as_secs(),
            high = self.policy.thresholds().high(),
            low = self.policy.thresholds().low(),
            "control loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_tick(Some(&shutdown)).await {
                Ok(report) => debug!(
                    checked = report.workloads.len(),
                    scaled = report.scaled(),
                    abandoned = report.abandoned,
                    "tick complete"
                ),
                Err(e) => warn!(
                    namespace = %self.settings.namespace,
                    error = %e,
                    "listing workloads failed, retrying next tick"
                ),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        info!("control loop shutting down");
    }
}
