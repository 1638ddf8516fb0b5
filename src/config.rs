//! Configuration for the smoke suite
//!
//! Build it programmatically, or read overrides from `KUBE_SMOKE_*`
//! environment variables. Defaults target the `mcp-kubernetes` deployment in
//! the `mcp-kubernetes` namespace.
//!
//! # Example
//!
//! ```
//! use kube_smoke::config::SmokeConfig;
//! use kube_smoke::suite::Marker;
//! use std::time::Duration;
//!
//! let config = SmokeConfig::new()
//!     .deployments(["my-app"])
//!     .namespace("apps")
//!     .timeout(Duration::from_secs(120))
//!     .marker(Marker::Smoke);
//! ```
//!
//! # Environment Variables
//!
//! - `KUBE_SMOKE_DEPLOYMENTS` - comma-separated deployment names
//! - `KUBE_SMOKE_NAMESPACE` - namespace to probe
//! - `KUBE_SMOKE_TIMEOUT_SECS` - readiness timeout
//! - `KUBE_SMOKE_POLL_INTERVAL_MS` - delay between readiness queries
//! - `KUBE_SMOKE_RERUNS` - reruns of flaky checks
//! - `KUBE_SMOKE_RERUN_DELAY_SECS` - delay between reruns
//! - `KUBE_SMOKE_MARKERS` - comma-separated markers to select (`smoke`, `upgrade`)
//! - `KUBE_SMOKE_KUBECONFIG` - kubeconfig path
//! - `KUBE_SMOKE_CONTEXT` - kubeconfig context

use std::time::Duration;

use crate::probe::{ProbeRequest, DEFAULT_POLL_INTERVAL};
use crate::retry::RetryPolicy;
use crate::suite::Marker;

pub const DEFAULT_DEPLOYMENT: &str = "mcp-kubernetes";
pub const DEFAULT_NAMESPACE: &str = "mcp-kubernetes";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(560);

const ENV_PREFIX: &str = "KUBE_SMOKE_";

/// Errors from reading configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("{key} must not be empty")]
    Empty { key: String },

    #[error("unknown marker {0:?} (expected smoke or upgrade)")]
    InvalidMarker(String),
}

/// Smoke suite configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Deployments to wait for
    pub deployments: Vec<String>,

    /// Namespace the deployments live in
    pub namespace: String,

    /// How long to wait for the deployments to become ready
    pub timeout: Duration,

    /// Delay between readiness queries
    pub poll_interval: Duration,

    /// Reruns for the replica check
    pub retry: RetryPolicy,

    /// Only run cases carrying one of these markers (empty runs all)
    pub markers: Vec<Marker>,

    /// Kubeconfig path (ambient config when unset)
    pub kubeconfig: Option<String>,

    /// Kubeconfig context
    pub context: Option<String>,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            deployments: vec![DEFAULT_DEPLOYMENT.to_string()],
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
            markers: Vec::new(),
            kubeconfig: None,
            context: None,
        }
    }
}

impl SmokeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `KUBE_SMOKE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which receives full variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| -> Option<(String, String)> {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value.trim().to_string()))
        };

        let mut config = Self::default();

        if let Some((key, value)) = var("DEPLOYMENTS") {
            let names = split_list(&value);
            if names.is_empty() {
                return Err(ConfigError::Empty { key });
            }
            config.deployments = names;
        }
        if let Some((key, value)) = var("NAMESPACE") {
            if value.is_empty() {
                return Err(ConfigError::Empty { key });
            }
            config.namespace = value;
        }
        if let Some((key, value)) = var("TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_number(&key, &value)?);
        }
        if let Some((key, value)) = var("POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse_number(&key, &value)?);
        }
        if let Some((key, value)) = var("RERUNS") {
            let reruns = u32::try_from(parse_number(&key, &value)?).map_err(|_| {
                ConfigError::InvalidNumber {
                    key: key.clone(),
                    value: value.clone(),
                }
            })?;
            config.retry = RetryPolicy::reruns(reruns, config.retry.delay);
        }
        if let Some((key, value)) = var("RERUN_DELAY_SECS") {
            config.retry.delay = Duration::from_secs(parse_number(&key, &value)?);
        }
        if let Some((_, value)) = var("MARKERS") {
            config.markers = split_list(&value)
                .iter()
                .map(|m| m.parse())
                .collect::<Result<Vec<Marker>, ConfigError>>()?;
        }
        if let Some((_, value)) = var("KUBECONFIG").filter(|(_, v)| !v.is_empty()) {
            config.kubeconfig = Some(value);
        }
        if let Some((_, value)) = var("CONTEXT").filter(|(_, v)| !v.is_empty()) {
            config.context = Some(value);
        }

        Ok(config)
    }

    /// Replace the deployments to wait for
    pub fn deployments(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deployments = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Select cases carrying this marker
    pub fn marker(mut self, marker: Marker) -> Self {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    pub fn kubeconfig(mut self, path: impl Into<String>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The readiness probe described by this configuration
    pub fn probe_request(&self) -> ProbeRequest {
        ProbeRequest::new(self.deployments.iter().cloned(), &self.namespace, self.timeout)
            .interval(self.poll_interval)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}
