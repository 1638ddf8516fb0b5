//! Once-resolved deployment fixture
//!
//! The readiness probe is expensive (it can wait for minutes), so the suite
//! resolves the deployments once and hands the cached result to every case
//! that needs it. The cache is an explicit value owned by whoever runs the
//! cases and is dropped with them.

use tokio::sync::OnceCell;
use tracing::info;

use crate::cluster::ClusterApi;
use crate::descriptor::DeploymentDescriptor;
use crate::probe::{probe, ProbeError, ProbeRequest};

/// Deployments resolved by the first successful probe
#[derive(Debug, Default)]
pub struct DeploymentCache {
    cell: OnceCell<Vec<DeploymentDescriptor>>,
}

impl DeploymentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached deployments, probing on first use
    ///
    /// A failed probe leaves the cache empty; the next call probes again.
    pub async fn get_or_probe(
        &self,
        cluster: &dyn ClusterApi,
        request: &ProbeRequest,
    ) -> Result<&[DeploymentDescriptor], ProbeError> {
        self.cell
            .get_or_try_init(|| async {
                info!(
                    namespace = %request.namespace(),
                    names = ?request.names(),
                    "Waiting for deployments.."
                );
                let deployments = probe(cluster, request).await?;
                info!(namespace = %request.namespace(), "Deployments look satisfied..");
                Ok::<_, ProbeError>(deployments)
            })
            .await
            .map(Vec::as_slice)
    }

    /// The cached deployments, if a probe already succeeded
    pub fn get(&self) -> Option<&[DeploymentDescriptor]> {
        self.cell.get().map(Vec::as_slice)
    }
}
