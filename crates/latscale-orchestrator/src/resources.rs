//! The slices of Kubernetes objects the controller reads and writes.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use latscale_core::{Workload, WorkloadRef};

/// Label stamped on every scaled Deployment.
pub const LAST_SCALING_LABEL: &str = "last_scaling";

/// Replica count Kubernetes assumes when `spec.replicas` is unset.
const DEFAULT_REPLICAS: u32 = 1;

#[derive(Debug, Deserialize)]
pub struct DeploymentList {
    #[serde(default)]
    pub items: Vec<Deployment>,
}

#[derive(Debug, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<ReplicaSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// `spec` of a Deployment or of its `scale` subresource.
#[derive(Debug, Default, Deserialize)]
pub struct ReplicaSpec {
    #[serde(default)]
    pub replicas: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct Scale {
    #[serde(default)]
    pub spec: Option<ReplicaSpec>,
}

/// `meta/v1 Status`, returned on API errors.
#[derive(Debug, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
}

/// Replica count of a spec; unset means the API default. Negative counts
/// are returned as `Err` with the raw value.
pub fn replicas_of(spec: Option<&ReplicaSpec>) -> Result<u32, i32> {
    match spec.and_then(|s| s.replicas) {
        None => Ok(DEFAULT_REPLICAS),
        Some(n) => u32::try_from(n).map_err(|_| n),
    }
}

/// Convert a listing into workloads, dropping entries with an unusable
/// replica count.
pub fn into_workloads(list: DeploymentList, namespace: &str) -> Vec<Workload> {
    list.items
        .into_iter()
        .filter_map(|d| {
            let ns = d.metadata.namespace.unwrap_or_else(|| namespace.to_string());
            let reference = WorkloadRef::new(ns, d.metadata.name);
            match replicas_of(d.spec.as_ref()) {
                Ok(replicas) => Some(Workload::new(reference, replicas)),
                Err(raw) => {
                    warn!(workload = %reference, replicas = raw, "skipping workload with negative replica count");
                    None
                }
            }
        })
        .collect()
}

/// Merge patch that sets `spec.replicas` and stamps the scaling label.
pub fn scale_patch(replicas: u32, stamp: &str) -> serde_json::Value {
    json!({
        "metadata": {
            "labels": { LAST_SCALING_LABEL: stamp }
        },
        "spec": { "replicas": replicas }
    })
}

/// Timestamp formatted as a valid label value (no `:`).
pub fn label_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H_%M_%S").to_string()
}
