//! latscale-orchestrator — the controller's view of the cluster.
//!
//! Lists the workloads of a namespace, reads their replica counts, and
//! patches a new count with a `last_scaling` timestamp label. Errors are
//! returned as [`OrchestrationError`] so the control loop can skip a
//! workload for one tick and carry on.
//!
//! The API server is found from an explicit URL, the in-cluster service
//! environment, or the current context of a kubeconfig, in that order.
//! File-backed bearer tokens are re-read on every request.
//!
//! # Kubernetes mapping
//!
//! ```text
//! list_workloads   GET   /apis/apps/v1/namespaces/{ns}/deployments
//! read_replicas    GET   /apis/apps/v1/namespaces/{ns}/deployments/{name}/scale
//! patch_replicas   PATCH /apis/apps/v1/namespaces/{ns}/deployments/{name}
//!                        (application/merge-patch+json)
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod kubeconfig;
pub mod kubernetes;
pub mod resources;

pub use client::{OrchestrationClient, ensure_positive};
pub use credentials::{ApiAccess, BearerToken};
pub use error::{OrchestrationError, OrchestrationResult};
pub use kubernetes::KubernetesClient;
