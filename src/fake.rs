//! Scripted in-memory cluster
//!
//! [`FakeCluster`] implements [`ClusterApi`] from a timeline of deployment
//! states, so readiness scenarios can be replayed without a live cluster.
//! Time is measured with `tokio::time`, which makes it work with a paused
//! test clock (`#[tokio::test(start_paused = true)]`).
//!
//! # Example
//!
//! ```
//! use kube_smoke::fake::FakeCluster;
//! use std::time::Duration;
//!
//! // Two nodes, a deployment that becomes ready after 30 seconds
//! let cluster = FakeCluster::new()
//!     .nodes(2)
//!     .deployment("mcp-kubernetes", "mcp-kubernetes", 2, 0)
//!     .deployment_at(Duration::from_secs(30), "mcp-kubernetes", "mcp-kubernetes", 2, 2);
//! ```

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::Node;
use kube::api::ObjectMeta;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::cluster::{ClusterApi, ClusterError};

#[derive(Debug, Clone)]
struct Scripted {
    at: Duration,
    namespace: String,
    name: String,
    deployment: Option<Deployment>,
}

/// In-memory cluster replaying a scripted timeline
#[derive(Debug)]
pub struct FakeCluster {
    start: Instant,
    nodes: Vec<Node>,
    timeline: Vec<Scripted>,
    unreachable: bool,
    node_queries: AtomicU32,
    deployment_queries: AtomicU32,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    /// Empty cluster: no nodes, no deployments; the clock starts now
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            nodes: Vec::new(),
            timeline: Vec::new(),
            unreachable: false,
            node_queries: AtomicU32::new(0),
            deployment_queries: AtomicU32::new(0),
        }
    }

    /// Add a node
    #[must_use]
    pub fn node(mut self, name: &str) -> Self {
        self.nodes.push(Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        self
    }

    /// Add `count` nodes named `node-0`, `node-1`, ...
    #[must_use]
    pub fn nodes(self, count: usize) -> Self {
        (0..count).fold(self, |cluster, i| cluster.node(&format!("node-{i}")))
    }

    /// Deployment state from the start
    #[must_use]
    pub fn deployment(self, namespace: &str, name: &str, desired: i32, ready: i32) -> Self {
        self.deployment_at(Duration::ZERO, namespace, name, desired, ready)
    }

    /// Deployment state from `at` after the cluster was created
    ///
    /// A deployment scripted only at a later point does not exist before it.
    #[must_use]
    pub fn deployment_at(
        mut self,
        at: Duration,
        namespace: &str,
        name: &str,
        desired: i32,
        ready: i32,
    ) -> Self {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(desired),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                replicas: Some(desired),
                ready_replicas: (ready > 0).then_some(ready),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.timeline.push(Scripted {
            at,
            namespace: namespace.to_string(),
            name: name.to_string(),
            deployment: Some(deployment),
        });
        self
    }

    /// Remove a deployment from `at` after the cluster was created
    #[must_use]
    pub fn deleted_at(mut self, at: Duration, namespace: &str, name: &str) -> Self {
        self.timeline.push(Scripted {
            at,
            namespace: namespace.to_string(),
            name: name.to_string(),
            deployment: None,
        });
        self
    }

    /// Fail every query as if the API server could not be reached
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Number of node list queries served so far
    pub fn node_queries(&self) -> u32 {
        self.node_queries.load(Ordering::SeqCst)
    }

    /// Number of deployment list queries served so far
    pub fn deployment_queries(&self) -> u32 {
        self.deployment_queries.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), ClusterError> {
        if self.unreachable {
            return Err(ClusterError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        self.node_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.nodes.clone())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        self.deployment_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        let elapsed = self.start.elapsed();

        // Names in order of first appearance, like a stable list response
        let mut names: Vec<&str> = Vec::new();
        for entry in self.timeline.iter().filter(|e| e.namespace == namespace) {
            if !names.contains(&entry.name.as_str()) {
                names.push(&entry.name);
            }
        }

        let deployments = names
            .into_iter()
            .filter_map(|name| {
                self.timeline
                    .iter()
                    .filter(|e| e.namespace == namespace && e.name == name && e.at <= elapsed)
                    .max_by_key(|e| e.at)
                    .and_then(|e| e.deployment.clone())
            })
            .collect();

        Ok(deployments)
    }
}
