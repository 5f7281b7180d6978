//! The orchestration boundary as seen by the control loop.

use std::future::Future;

use latscale_core::{MIN_REPLICAS, Workload, WorkloadRef};

use crate::error::{OrchestrationError, OrchestrationResult};

/// Read and mutate workload replica counts.
pub trait OrchestrationClient: Send + Sync {
    /// Snapshot of every workload in `namespace` with its replica count.
    /// Order is unspecified.
    fn list_workloads(
        &self,
        namespace: &str,
    ) -> impl Future<Output = OrchestrationResult<Vec<Workload>>> + Send;

    /// Current replica count of one workload.
    fn read_replicas(
        &self,
        workload: &WorkloadRef,
    ) -> impl Future<Output = OrchestrationResult<u32>> + Send;

    /// Set the replica count. Sending the same target twice is harmless.
    /// Implementations must refuse `0` via [`ensure_positive`] without
    /// contacting the API.
    fn patch_replicas(
        &self,
        workload: &WorkloadRef,
        replicas: u32,
    ) -> impl Future<Output = OrchestrationResult<()>> + Send;
}

/// Reject replica targets below [`MIN_REPLICAS`].
pub fn ensure_positive(replicas: u32) -> OrchestrationResult<u32> {
    if replicas < MIN_REPLICAS {
        return Err(OrchestrationError::InvalidReplicas(replicas.into()));
    }
    Ok(replicas)
}
