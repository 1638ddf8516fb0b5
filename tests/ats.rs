//! Smoke and upgrade checks against a live cluster
//!
//! These tests require a running Kubernetes cluster with the deployment under
//! test installed, reachable via kubeconfig. They are marked with #[ignore]
//! and must be run explicitly:
//!
//! ```bash
//! cargo test --test ats -- --ignored --test-threads=1
//! ```
//!
//! Targets come from `KUBE_SMOKE_*` variables (see `SmokeConfig::from_env`);
//! by default the `mcp-kubernetes` deployment in the `mcp-kubernetes`
//! namespace is checked.

use kube_smoke::{checks, retry, Cluster, DeploymentCache, SmokeConfig, SmokeSuite};

fn config() -> SmokeConfig {
    SmokeConfig::from_env().expect("Invalid KUBE_SMOKE_* configuration")
}

#[kube_smoke::test]
#[ignore] // Requires real cluster
async fn test_api_working(cluster: Cluster) {
    let nodes = checks::api_working(&cluster)
        .await
        .expect("Cluster should report at least one node");
    assert!(nodes >= 1);
}

#[kube_smoke::test]
#[ignore] // Requires real cluster
async fn test_pods_available(cluster: Cluster) {
    let config = config();
    let cache = DeploymentCache::new();

    let deployments = cache
        .get_or_probe(&cluster, &config.probe_request())
        .await
        .expect("Deployments should become ready");

    // Freshly scheduled pods can briefly under-report readiness
    let fresh = retry(config.retry, || checks::pods_available(&cluster, deployments))
        .await
        .expect("Every deployment should have all replicas ready");

    for deployment in fresh {
        assert_eq!(deployment.ready_replicas, deployment.desired_replicas);
    }
}

#[kube_smoke::test]
#[ignore] // Requires real cluster
async fn test_suite(cluster: Cluster) {
    let report = SmokeSuite::new(&cluster, config()).run().await;
    assert!(report.is_success(), "{report}");
}
