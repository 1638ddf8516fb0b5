//! Smoke suite runner
//!
//! Runs the named smoke/upgrade cases against a cluster and collects a
//! report. Cases carry markers so a run can be narrowed to, say, the upgrade
//! checks only.
//!
//! | Case                  | Markers          | Reruns          |
//! |-----------------------|------------------|-----------------|
//! | `test_api_working`    | smoke            | none            |
//! | `test_pods_available` | smoke, upgrade   | config `retry`  |
//!
//! # Example
//!
//! ```no_run
//! use kube_smoke::cluster::Cluster;
//! use kube_smoke::config::SmokeConfig;
//! use kube_smoke::suite::SmokeSuite;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SmokeConfig::from_env()?;
//!     let cluster = Cluster::from_smoke_config(&config).await?;
//!
//!     let report = SmokeSuite::new(&cluster, config).run().await;
//!     println!("{report}");
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::checks::{self, CheckError};
use crate::cluster::ClusterApi;
use crate::config::{ConfigError, SmokeConfig};
use crate::descriptor::DeploymentDescriptor;
use crate::fixture::DeploymentCache;
use crate::probe::ProbeError;
use crate::retry::retry;

/// Tag used to select cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    /// Basic availability after install
    Smoke,
    /// Health after an upgrade
    Upgrade,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smoke => write!(f, "smoke"),
            Self::Upgrade => write!(f, "upgrade"),
        }
    }
}

impl FromStr for Marker {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smoke" => Ok(Self::Smoke),
            "upgrade" => Ok(Self::Upgrade),
            other => Err(ConfigError::InvalidMarker(other.to_string())),
        }
    }
}

/// The cases of the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    ApiWorking,
    PodsAvailable,
}

impl Case {
    pub const ALL: [Case; 2] = [Case::ApiWorking, Case::PodsAvailable];

    pub fn name(self) -> &'static str {
        match self {
            Self::ApiWorking => "test_api_working",
            Self::PodsAvailable => "test_pods_available",
        }
    }

    pub fn markers(self) -> &'static [Marker] {
        match self {
            Self::ApiWorking => &[Marker::Smoke],
            Self::PodsAvailable => &[Marker::Smoke, Marker::Upgrade],
        }
    }

    /// Whether the case runs under a marker selection (empty selects all)
    pub fn selected_by(self, selection: &[Marker]) -> bool {
        selection.is_empty() || self.markers().iter().any(|m| selection.contains(m))
    }
}

/// Errors from a suite case
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("deployment fixture failed: {0}")]
    Fixture(#[from] ProbeError),

    #[error(transparent)]
    Check(#[from] CheckError),
}

impl SuiteError {
    /// Readiness timeouts and failed checks count as failures; everything
    /// else (API errors, bad requests) is an error
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Fixture(ProbeError::Timeout(_)) => true,
            Self::Fixture(_) => false,
            Self::Check(e) => e.is_assertion(),
        }
    }
}

/// How a case ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed(String),
    Error(String),
}

impl Outcome {
    fn from_result<T>(result: &Result<T, SuiteError>) -> Self {
        match result {
            Ok(_) => Self::Passed,
            Err(e) if e.is_failure() => Self::Failed(e.to_string()),
            Err(e) => Self::Error(e.to_string()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed(_) => "FAILED",
            Self::Error(_) => "ERROR",
        }
    }
}

/// Result of one case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub name: &'static str,
    pub outcome: Outcome,
    /// Check runs, including reruns
    pub attempts: u32,
    pub duration_secs: f64,
}

/// Result of a suite run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteReport {
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Every case passed (an empty run counts as success)
    pub fn is_success(&self) -> bool {
        self.cases.iter().all(|c| c.outcome == Outcome::Passed)
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Error(_)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.outcome)).count()
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Smoke suite: {} passed, {} failed, {} errors",
            self.passed(),
            self.failed(),
            self.errors()
        )?;
        for (i, case) in self.cases.iter().enumerate() {
            let prefix = if i == self.cases.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let plural = if case.attempts == 1 { "" } else { "s" };
            write!(
                f,
                "{} {} {} ({} attempt{}, {:.2}s)",
                prefix,
                case.outcome.label(),
                case.name,
                case.attempts,
                plural,
                case.duration_secs
            )?;
            match &case.outcome {
                Outcome::Passed => writeln!(f)?,
                Outcome::Failed(msg) | Outcome::Error(msg) => writeln!(f, ": {}", msg.trim())?,
            }
        }
        Ok(())
    }
}

/// The smoke suite bound to one cluster
///
/// Owns the deployment fixture, so the readiness probe runs at most once per
/// suite no matter how many cases need the deployments.
pub struct SmokeSuite<'a> {
    cluster: &'a dyn ClusterApi,
    config: SmokeConfig,
    deployments: DeploymentCache,
}

impl<'a> SmokeSuite<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, config: SmokeConfig) -> Self {
        Self {
            cluster,
            config,
            deployments: DeploymentCache::new(),
        }
    }

    pub fn config(&self) -> &SmokeConfig {
        &self.config
    }

    /// The deployment fixture shared by the cases
    pub fn deployments(&self) -> &DeploymentCache {
        &self.deployments
    }

    /// Cases selected by the configured markers, in suite order
    pub fn selected_cases(&self) -> Vec<Case> {
        Case::ALL
            .into_iter()
            .filter(|c| c.selected_by(&self.config.markers))
            .collect()
    }

    /// Run every selected case in order
    pub async fn run(&self) -> SuiteReport {
        let mut report = SuiteReport::default();
        for case in self.selected_cases() {
            report.cases.push(self.run_case(case).await);
        }

        info!(
            passed = report.passed(),
            failed = report.failed(),
            errors = report.errors(),
            "Smoke suite finished"
        );
        report
    }

    /// Run a single case and report how it ended
    pub async fn run_case(&self, case: Case) -> CaseReport {
        info!(case = case.name(), "Running case");
        let start = Instant::now();

        let (outcome, attempts) = match case {
            Case::ApiWorking => {
                let result = self.test_api_working().await;
                (Outcome::from_result(&result), 1)
            }
            Case::PodsAvailable => {
                let mut attempts = 0;
                let result = self.pods_available_counted(&mut attempts).await;
                (Outcome::from_result(&result), attempts)
            }
        };

        if outcome == Outcome::Passed {
            info!(case = case.name(), attempts = attempts, "Case passed");
        } else {
            warn!(case = case.name(), attempts = attempts, outcome = ?outcome, "Case did not pass");
        }

        CaseReport {
            name: case.name(),
            outcome,
            attempts,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// The cluster API answers and reports at least one node
    pub async fn test_api_working(&self) -> Result<usize, SuiteError> {
        Ok(checks::api_working(self.cluster).await?)
    }

    /// Every fixture deployment has all desired replicas ready
    ///
    /// Resolves the fixture on first use, then reruns the replica check
    /// according to the configured retry policy.
    pub async fn test_pods_available(&self) -> Result<Vec<DeploymentDescriptor>, SuiteError> {
        let mut attempts = 0;
        self.pods_available_counted(&mut attempts).await
    }

    async fn pods_available_counted(
        &self,
        attempts: &mut u32,
    ) -> Result<Vec<DeploymentDescriptor>, SuiteError> {
        let request = self.config.probe_request();
        let deployments = self.deployments.get_or_probe(self.cluster, &request).await?;

        let fresh = retry(self.config.retry, || {
            *attempts += 1;
            checks::pods_available(self.cluster, deployments)
        })
        .await?;

        Ok(fresh)
    }
}
