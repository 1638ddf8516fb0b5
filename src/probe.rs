//! Deployment readiness prober
//!
//! Polls the deployments of a namespace until every requested deployment
//! reports as many ready replicas as it desires, or the timeout elapses.
//!
//! # Example
//!
//! ```no_run
//! use kube_smoke::cluster::Cluster;
//! use kube_smoke::probe::{probe, ProbeRequest};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = Cluster::connect().await?;
//!     let request = ProbeRequest::new(["mcp-kubernetes"], "mcp-kubernetes", Duration::from_secs(560));
//!
//!     for deployment in probe(&cluster, &request).await? {
//!         println!("{} is {}", deployment.name, deployment.state_description());
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::cluster::{ClusterApi, ClusterError};
use crate::descriptor::DeploymentDescriptor;
use crate::wait::{PendingTarget, TimeoutError};

/// Default delay between two list queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from a readiness probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Invalid probe request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Api(#[from] ClusterError),
}

/// Which deployments to wait for, where, and for how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    names: Vec<String>,
    namespace: String,
    timeout: Duration,
    interval: Duration,
}

impl ProbeRequest {
    /// Create a request for the given deployment names
    ///
    /// Repeated names are collapsed, keeping the first occurrence.
    pub fn new(
        names: impl IntoIterator<Item = impl Into<String>>,
        namespace: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        Self {
            names: unique,
            namespace: namespace.into(),
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the delay between list queries
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    fn validate(&self) -> Result<(), ProbeError> {
        if self.names.is_empty() {
            return Err(ProbeError::InvalidRequest(
                "at least one deployment name is required".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ProbeError::InvalidRequest(
                "timeout must be positive".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(ProbeError::InvalidRequest(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Polling,
    Ready,
    TimedOut,
}

impl ProbeState {
    /// Transition after one observation
    ///
    /// Readiness wins over the deadline: an observation taken at or after the
    /// timeout that finds every target ready still ends in `Ready`.
    #[must_use]
    pub fn advance(self, all_ready: bool, elapsed: Duration, timeout: Duration) -> Self {
        match self {
            Self::Polling if all_ready => Self::Ready,
            Self::Polling if elapsed >= timeout => Self::TimedOut,
            other => other,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Polling)
    }
}

/// Result of a single list query against the requested names
#[derive(Debug)]
struct Observation {
    matched: Vec<DeploymentDescriptor>,
    pending: Vec<PendingTarget>,
}

impl Observation {
    fn all_ready(&self) -> bool {
        self.pending.is_empty()
    }
}

async fn observe(
    cluster: &dyn ClusterApi,
    request: &ProbeRequest,
) -> Result<Observation, ClusterError> {
    let deployments = cluster.list_deployments(&request.namespace).await?;

    // Keep list order for the result
    let matched: Vec<DeploymentDescriptor> = deployments
        .iter()
        .map(DeploymentDescriptor::from)
        .filter(|d| request.names.contains(&d.name))
        .collect();

    let pending = request
        .names
        .iter()
        .filter_map(|name| match matched.iter().find(|d| &d.name == name) {
            None => Some(PendingTarget::not_found(name.as_str())),
            Some(d) if !d.is_ready() => {
                Some(PendingTarget::new(name.as_str(), d.state_description()))
            }
            Some(_) => None,
        })
        .collect();

    Ok(Observation { matched, pending })
}

/// Wait until every requested deployment is ready
///
/// Returns one descriptor per requested name, in the order the list query
/// returned them. Fails with [`ProbeError::Timeout`] when the timeout elapses
/// first, including while a list query is still outstanding; API errors end
/// the probe immediately.
pub async fn probe(
    cluster: &dyn ClusterApi,
    request: &ProbeRequest,
) -> Result<Vec<DeploymentDescriptor>, ProbeError> {
    request.validate()?;

    let start = Instant::now();
    let mut attempts = 0u32;
    let mut state = ProbeState::Polling;

    debug!(
        namespace = %request.namespace,
        names = ?request.names,
        timeout = ?request.timeout,
        "Starting readiness probe"
    );

    // Targets still pending as of the last answered query
    let mut last_pending: Option<Vec<PendingTarget>> = None;

    loop {
        attempts += 1;
        let remaining = request.timeout.saturating_sub(start.elapsed());
        let observation = match timeout(remaining, observe(cluster, request)).await {
            Ok(observation) => observation?,
            Err(_) => {
                let elapsed = start.elapsed();
                let pending = last_pending.unwrap_or_else(|| {
                    request
                        .names
                        .iter()
                        .map(|name| PendingTarget::not_found(name.as_str()))
                        .collect()
                });
                warn!(
                    namespace = %request.namespace,
                    attempts = attempts,
                    elapsed = ?elapsed,
                    pending = ?pending,
                    "Timed out waiting for the deployment list"
                );
                return Err(TimeoutError::new(&request.namespace, request.timeout, elapsed)
                    .with_pending(pending)
                    .with_attempts(attempts)
                    .into());
            }
        };
        let elapsed = start.elapsed();

        state = state.advance(observation.all_ready(), elapsed, request.timeout);
        match state {
            ProbeState::Ready => {
                info!(
                    namespace = %request.namespace,
                    attempts = attempts,
                    elapsed = ?elapsed,
                    "Deployments are ready"
                );
                return Ok(observation.matched);
            }
            ProbeState::TimedOut => {
                warn!(
                    namespace = %request.namespace,
                    attempts = attempts,
                    elapsed = ?elapsed,
                    pending = ?observation.pending,
                    "Timed out waiting for deployments"
                );
                return Err(TimeoutError::new(&request.namespace, request.timeout, elapsed)
                    .with_pending(observation.pending)
                    .with_attempts(attempts)
                    .into());
            }
            ProbeState::Polling => {
                debug!(
                    namespace = %request.namespace,
                    pending = observation.pending.len(),
                    elapsed = ?elapsed,
                    "Deployments not ready yet, waiting..."
                );
                last_pending = Some(observation.pending);
            }
        }

        // Last poll lands on the deadline
        let remaining = request.timeout.saturating_sub(elapsed);
        sleep(request.interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCluster;
    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Node;
    use std::sync::atomic::{AtomicU32, Ordering};

    const NS: &str = "mcp-kubernetes";

    /// Answers the first `answers` list queries, then stops responding
    struct StallingCluster {
        inner: FakeCluster,
        answers: u32,
        calls: AtomicU32,
    }

    impl StallingCluster {
        fn new(inner: FakeCluster, answers: u32) -> Self {
            Self {
                inner,
                answers,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ClusterApi for StallingCluster {
        async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
            self.inner.list_nodes().await
        }

        async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.answers {
                sleep(Duration::from_secs(3600)).await;
            }
            self.inner.list_deployments(namespace).await
        }
    }

    #[test]
    fn test_request_collapses_duplicates() {
        let request = ProbeRequest::new(["a", "b", "a"], NS, Duration::from_secs(10));
        assert_eq!(request.names(), ["a".to_string(), "b".to_string()]);
        assert_eq!(request.poll_interval(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_state_transitions() {
        let timeout = Duration::from_secs(10);
        let polling = ProbeState::Polling;

        assert_eq!(polling.advance(false, Duration::from_secs(1), timeout), ProbeState::Polling);
        assert_eq!(polling.advance(true, Duration::from_secs(1), timeout), ProbeState::Ready);
        assert_eq!(polling.advance(false, timeout, timeout), ProbeState::TimedOut);
        assert_eq!(polling.advance(true, timeout, timeout), ProbeState::Ready);

        // Terminal states stay put
        assert_eq!(ProbeState::Ready.advance(false, timeout, timeout), ProbeState::Ready);
        assert_eq!(
            ProbeState::TimedOut.advance(true, Duration::ZERO, timeout),
            ProbeState::TimedOut
        );
        assert!(!ProbeState::Polling.is_terminal());
        assert!(ProbeState::Ready.is_terminal());
        assert!(ProbeState::TimedOut.is_terminal());
    }

    #[tokio::test]
    async fn test_empty_names_rejected() {
        let cluster = FakeCluster::new();
        let request = ProbeRequest::new(Vec::<String>::new(), NS, Duration::from_secs(10));

        let err = probe(&cluster, &request).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest(_)));
        assert_eq!(cluster.deployment_queries(), 0, "should not query the cluster");
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let cluster = FakeCluster::new();
        let request = ProbeRequest::new(["app"], NS, Duration::ZERO);

        let err = probe(&cluster, &request).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let cluster = FakeCluster::new().deployment(NS, "app", 1, 1);
        let request =
            ProbeRequest::new(["app"], NS, Duration::from_secs(10)).interval(Duration::ZERO);

        let err = probe(&cluster, &request).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest(ref msg) if msg.contains("interval")));
        assert_eq!(cluster.deployment_queries(), 0, "should not query the cluster");
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_poll_lands_on_deadline() {
        // Polls at 0s, 10s and the clamped 15s
        let cluster = FakeCluster::new()
            .deployment(NS, "app", 2, 0)
            .deployment_at(Duration::from_secs(15), NS, "app", 2, 2);
        let request = ProbeRequest::new(["app"], NS, Duration::from_secs(15))
            .interval(Duration::from_secs(10));

        let start = Instant::now();
        let result = probe(&cluster, &request).await.unwrap();
        assert!(result[0].is_ready());
        assert_eq!(cluster.deployment_queries(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_first_query_times_out() {
        let cluster = StallingCluster::new(FakeCluster::new().deployment(NS, "app", 2, 2), 0);
        let request = ProbeRequest::new(["app"], NS, Duration::from_secs(10));

        let start = Instant::now();
        let err = probe(&cluster, &request).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        match err {
            ProbeError::Timeout(timeout) => {
                assert_eq!(timeout.pending_names().collect::<Vec<_>>(), vec!["app"]);
                assert_eq!(timeout.pending[0].last_state, "not found");
                assert_eq!(timeout.attempts, 1);
            }
            other => panic!("expected Timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_query_keeps_last_known_state() {
        let cluster = StallingCluster::new(FakeCluster::new().deployment(NS, "app", 2, 1), 3);
        let request = ProbeRequest::new(["app"], NS, Duration::from_secs(10));

        let start = Instant::now();
        let err = probe(&cluster, &request).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        match err {
            ProbeError::Timeout(timeout) => {
                assert_eq!(timeout.pending[0].last_state, "1/2 ready");
                assert_eq!(timeout.attempts, 4);
            }
            other => panic!("expected Timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_poll() {
        let cluster = FakeCluster::new().deployment(NS, "app", 2, 2);
        let request = ProbeRequest::new(["app"], NS, Duration::from_secs(10));

        let result = probe(&cluster, &request).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "app");
        assert_eq!(cluster.deployment_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_ready() {
        let cluster = FakeCluster::new()
            .deployment(NS, "app", 2, 0)
            .deployment_at(Duration::from_secs(5), NS, "app", 2, 1)
            .deployment_at(Duration::from_secs(12), NS, "app", 2, 2);
        let request = ProbeRequest::new(["app"], NS, Duration::from_secs(60));

        let result = probe(&cluster, &request).await.unwrap();
        assert_eq!(result[0].ready_replicas, 2);
        assert_eq!(cluster.deployment_queries(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_pending_names() {
        let cluster = FakeCluster::new()
            .deployment(NS, "api", 1, 1)
            .deployment(NS, "worker", 3, 1);
        let request = ProbeRequest::new(["api", "worker", "ghost"], NS, Duration::from_secs(5));

        let err = probe(&cluster, &request).await.unwrap_err();
        match err {
            ProbeError::Timeout(timeout) => {
                assert_eq!(timeout.pending_names().collect::<Vec<_>>(), vec!["worker", "ghost"]);
                assert_eq!(timeout.pending[0].last_state, "1/3 ready");
                assert_eq!(timeout.pending[1].last_state, "not found");
                assert!(timeout.elapsed >= Duration::from_secs(5));
                assert_eq!(timeout.attempts, 6);
            }
            other => panic!("expected Timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_follows_list_order() {
        let cluster = FakeCluster::new()
            .deployment(NS, "zeta", 1, 1)
            .deployment(NS, "alpha", 1, 1)
            .deployment(NS, "unrelated", 1, 0);
        let request = ProbeRequest::new(["alpha", "zeta"], NS, Duration::from_secs(5));

        let names: Vec<String> = probe(&cluster, &request)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_error_is_not_retried() {
        let cluster = FakeCluster::new().unreachable();
        let request = ProbeRequest::new(["app"], NS, Duration::from_secs(60));

        let err = probe(&cluster, &request).await.unwrap_err();
        assert!(matches!(err, ProbeError::Api(ClusterError::Unavailable(_))));
        assert_eq!(cluster.deployment_queries(), 1);
    }
}
