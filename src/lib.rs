//! kube-smoke - smoke and upgrade checks for Kubernetes deployments
//!
//! Verifies that a deployment becomes healthy after install or upgrade: the
//! cluster API answers and reports nodes, the named deployments appear, and
//! each of them has all of its desired replicas ready. Readiness is polled
//! within a timeout, and the replica check is rerun a bounded number of
//! times to ride out pods that were only just scheduled.
//!
//! # Example
//!
//! ```no_run
//! use kube_smoke::{Cluster, SmokeConfig, SmokeSuite};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     kube_smoke::telemetry::init_logging();
//!
//!     let config = SmokeConfig::from_env()?;
//!     let cluster = Cluster::from_smoke_config(&config).await?;
//!     let report = SmokeSuite::new(&cluster, config).run().await;
//!
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! # Test Macro
//!
//! ```ignore
//! #[kube_smoke::test]
//! #[ignore] // Requires real cluster
//! async fn test_api_working(cluster: Cluster) {
//!     kube_smoke::checks::api_working(&cluster).await.unwrap();
//! }
//! ```

pub mod checks;
pub mod cluster;
pub mod config;
pub mod descriptor;
pub mod fake;
pub mod fixture;
pub mod probe;
pub mod retry;
pub mod suite;
pub mod telemetry;
pub mod wait;

pub use kube_smoke_macros::test;

// Re-export commonly used types
pub use checks::CheckError;
pub use cluster::{Cluster, ClusterApi, ClusterError};
pub use config::{ConfigError, SmokeConfig};
pub use descriptor::DeploymentDescriptor;
pub use fake::FakeCluster;
pub use fixture::DeploymentCache;
pub use probe::{probe, ProbeError, ProbeRequest, ProbeState};
pub use retry::{retry, RetryPolicy};
pub use suite::{Case, CaseReport, Marker, Outcome, SmokeSuite, SuiteError, SuiteReport};
pub use wait::{PendingTarget, TimeoutError};
