//! Typed deployment snapshots
//!
//! A [`DeploymentDescriptor`] is read out of the `k8s_openapi` deployment
//! returned by a list query. It is the only view of a deployment the prober
//! and the checks reason about.

use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};

/// Snapshot of a deployment's desired and ready replica counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDescriptor {
    /// Deployment name
    pub name: String,
    /// Namespace the deployment lives in
    pub namespace: String,
    /// `spec.replicas` (the API server defaults a missing value to 1)
    pub desired_replicas: i32,
    /// `status.readyReplicas` (absent until the first pod is ready)
    pub ready_replicas: i32,
}

impl DeploymentDescriptor {
    /// A deployment is ready when every desired replica reports ready
    ///
    /// Only replica counts are compared; rollout conditions are not inspected.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready_replicas == self.desired_replicas
    }

    /// Human-readable state, e.g. `1/2 ready`
    #[must_use]
    pub fn state_description(&self) -> String {
        format!("{}/{} ready", self.ready_replicas, self.desired_replicas)
    }
}

impl From<&Deployment> for DeploymentDescriptor {
    fn from(deployment: &Deployment) -> Self {
        let desired_replicas = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let ready_replicas = deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);

        Self {
            name: deployment.metadata.name.clone().unwrap_or_default(),
            namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
            desired_replicas,
            ready_replicas,
        }
    }
}
