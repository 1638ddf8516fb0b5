//! Rich timeout errors for readiness probes
//!
//! When a probe gives up, [`TimeoutError`] records which deployments were
//! still not ready and the last state observed for each of them.
//!
//! # Example
//!
//! ```ignore
//! match probe(&cluster, &request).await {
//!     Err(ProbeError::Timeout(err)) => {
//!         for target in &err.pending {
//!             println!("{}: {}", target.name, target.last_state);
//!         }
//!     }
//!     _ => {}
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// A probe target that had not become ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTarget {
    /// Deployment name
    pub name: String,
    /// Last observed state (e.g. "not found", "1/2 ready")
    pub last_state: String,
}

impl PendingTarget {
    pub fn new(name: impl Into<String>, last_state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_state: last_state.into(),
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::new(name, "not found")
    }
}

/// Timeout waiting for deployments to become ready
#[derive(Debug, Clone)]
pub struct TimeoutError {
    /// Namespace that was probed
    pub namespace: String,
    /// Targets still not ready when the probe gave up
    pub pending: Vec<PendingTarget>,
    /// Number of list queries issued
    pub attempts: u32,
    /// How long we waited before giving up
    pub elapsed: Duration,
    /// The timeout that was configured
    pub timeout: Duration,
}

impl TimeoutError {
    pub fn new(namespace: impl Into<String>, timeout: Duration, elapsed: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            pending: Vec::new(),
            attempts: 0,
            elapsed,
            timeout,
        }
    }

    /// Set the targets that were still not ready
    #[must_use]
    pub fn with_pending(mut self, pending: Vec<PendingTarget>) -> Self {
        self.pending = pending;
        self
    }

    /// Set the number of list queries issued
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Names of the targets that were still not ready
    pub fn pending_names(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|p| p.name.as_str())
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "Timed out waiting for deployments in namespace {}",
            self.namespace
        )?;
        writeln!(f, "├─ Attempts: {}", self.attempts)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        writeln!(f, "└─ Timeout: {:?}", self.timeout)?;

        if !self.pending.is_empty() {
            writeln!(f)?;
            writeln!(f, "Not ready:")?;
            for (i, target) in self.pending.iter().enumerate() {
                let prefix = if i == self.pending.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                writeln!(f, "{} deployment/{}: {}", prefix, target.name, target.last_state)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TimeoutError {}
