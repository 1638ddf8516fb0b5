//! Smoke assertions
//!
//! The two checks behind the smoke suite: the cluster API answers and reports
//! nodes, and every previously resolved deployment has all of its desired
//! replicas ready.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::cluster::{ClusterApi, ClusterError};
use crate::descriptor::DeploymentDescriptor;

/// Errors from smoke checks
///
/// Assertion failures and API errors are kept apart so a report can tell a
/// failing cluster from an unreachable one; see [`CheckError::is_assertion`].
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("assertion failed: cluster reports no nodes")]
    NoNodes,

    #[error("assertion failed: deployment {namespace}/{name} has {ready} ready replicas, expected {desired}")]
    ReplicaMismatch {
        namespace: String,
        name: String,
        ready: i32,
        desired: i32,
    },

    #[error("deployment {namespace}/{name} not found")]
    Missing { namespace: String, name: String },

    #[error(transparent)]
    Api(#[from] ClusterError),
}

impl CheckError {
    /// `true` for a failed assertion
    ///
    /// A deployment that disappeared after it was resolved is a lookup
    /// error, not an assertion, just like an error reaching the cluster.
    #[must_use]
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::NoNodes | Self::ReplicaMismatch { .. })
    }
}

/// Check that the cluster API is reachable and reports at least one node
///
/// Returns the node count.
pub async fn api_working(cluster: &dyn ClusterApi) -> Result<usize, CheckError> {
    let nodes = cluster.list_nodes().await?;
    if nodes.is_empty() {
        return Err(CheckError::NoNodes);
    }

    info!(nodes = nodes.len(), "Cluster API is working");
    Ok(nodes.len())
}

/// Check that each deployment has as many ready replicas as it desires
///
/// The deployments are re-read from the cluster, so a rerun observes the
/// current state rather than the snapshot it was given. Returns the fresh
/// descriptors in the order given.
pub async fn pods_available(
    cluster: &dyn ClusterApi,
    deployments: &[DeploymentDescriptor],
) -> Result<Vec<DeploymentDescriptor>, CheckError> {
    // One list query per namespace
    let mut by_namespace: BTreeMap<&str, Vec<DeploymentDescriptor>> = BTreeMap::new();
    for deployment in deployments {
        if !by_namespace.contains_key(deployment.namespace.as_str()) {
            let listed: Vec<DeploymentDescriptor> = cluster
                .list_deployments(&deployment.namespace)
                .await?
                .iter()
                .map(DeploymentDescriptor::from)
                .collect();
            by_namespace.insert(&deployment.namespace, listed);
        }
    }

    let mut fresh = Vec::with_capacity(deployments.len());
    for expected in deployments {
        let current = by_namespace
            .get(expected.namespace.as_str())
            .and_then(|listed| listed.iter().find(|d| d.name == expected.name))
            .ok_or_else(|| CheckError::Missing {
                namespace: expected.namespace.clone(),
                name: expected.name.clone(),
            })?;

        debug!(
            namespace = %current.namespace,
            name = %current.name,
            state = %current.state_description(),
            "Checking replicas"
        );

        if !current.is_ready() {
            return Err(CheckError::ReplicaMismatch {
                namespace: current.namespace.clone(),
                name: current.name.clone(),
                ready: current.ready_replicas,
                desired: current.desired_replicas,
            });
        }
        fresh.push(current.clone());
    }

    Ok(fresh)
}
