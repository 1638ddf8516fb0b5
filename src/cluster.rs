//! Cluster handle for smoke checks
//!
//! Wraps a `kube::Client` connected to the cluster under test and exposes the
//! read-only queries the checks need through [`ClusterApi`]. The prober and
//! the checks only ever see the trait, so they run the same way against a
//! live cluster or a scripted [`FakeCluster`](crate::fake::FakeCluster).
//!
//! # Example
//!
//! ```no_run
//! use kube_smoke::cluster::{Cluster, ClusterApi};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = Cluster::connect().await?;
//!     let nodes = cluster.list_nodes().await?;
//!     println!("cluster has {} nodes", nodes.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info, instrument};

use crate::config::SmokeConfig;

/// Errors from cluster connection and queries
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Failed to create Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Cluster API unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the cluster used by the prober and the checks
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List all nodes in the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    /// List the deployments in a namespace, in the order the API returns them
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError>;
}

/// Handle to the cluster under test
///
/// Cheap to clone; every clone shares the underlying HTTP client.
#[derive(Clone)]
pub struct Cluster {
    client: Client,
}

impl Cluster {
    /// Connect using the ambient configuration
    ///
    /// Resolves `KUBECONFIG`, `~/.kube/config` or the in-cluster service
    /// account, in that order.
    pub async fn connect() -> Result<Self, ClusterError> {
        let config = Config::infer()
            .await
            .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?;
        Self::from_config_inner(config)
    }

    /// Connect using an explicit kubeconfig path and/or context
    ///
    /// Falls back to [`connect`](Self::connect) when neither is given.
    pub async fn from_kubeconfig(
        path: Option<&str>,
        context: Option<&str>,
    ) -> Result<Self, ClusterError> {
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..Default::default()
        };

        let config = match (path, context) {
            (None, None) => return Self::connect().await,
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| ClusterError::Kubeconfig(format!("{path}: {e}")))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?
            }
            (None, Some(_)) => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?,
        };

        Self::from_config_inner(config)
    }

    /// Connect using the kubeconfig settings of a [`SmokeConfig`]
    pub async fn from_smoke_config(config: &SmokeConfig) -> Result<Self, ClusterError> {
        Self::from_kubeconfig(config.kubeconfig.as_deref(), config.context.as_deref()).await
    }

    /// Wrap an existing client
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying Kubernetes client
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn from_config_inner(config: Config) -> Result<Self, ClusterError> {
        info!(cluster_url = %config.cluster_url, "Connecting to cluster");
        let client = Client::try_from(config).map_err(ClusterError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ClusterApi for Cluster {
    #[instrument(skip(self))]
    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;
        debug!(count = nodes.items.len(), "Listed nodes");
        Ok(nodes.items)
    }

    #[instrument(skip(self))]
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployments = api.list(&ListParams::default()).await?;
        debug!(count = deployments.items.len(), "Listed deployments");
        Ok(deployments.items)
    }
}
