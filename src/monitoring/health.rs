//! Exporter Health
//!
//! Tracks whether the last collection cycle succeeded and when the last
//! successful one finished. Status and timestamp live behind one lock and
//! are always read and written as a pair.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Display format used by logs and the health endpoint
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Outcome of the most recent cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Failed,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        *self == HealthStatus::Ok
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "ok"),
            HealthStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Consistent view of the health pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    /// Time of the last successful cycle, or the Unix epoch after a failure
    pub last_updated: DateTime<Utc>,
}

impl HealthSnapshot {
    fn initial() -> Self {
        Self {
            status: HealthStatus::Ok,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Body of the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub last_updated: String,
}

impl From<HealthSnapshot> for HealthResponse {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            status: snapshot.status,
            last_updated: format_timestamp(snapshot.last_updated),
        }
    }
}

#[derive(Debug)]
struct Inner {
    snapshot: HealthSnapshot,
    /// Latest success time ever recorded; survives failures
    high_water: DateTime<Utc>,
}

/// Shared exporter health
#[derive(Debug)]
pub struct HealthState {
    inner: RwLock<Inner>,
}

impl HealthState {
    /// Healthy, never updated
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                snapshot: HealthSnapshot::initial(),
                high_water: DateTime::<Utc>::UNIX_EPOCH,
            }),
        }
    }

    /// Mark a successful cycle finished at `at`.
    ///
    /// The stored time never moves behind an earlier success, even if the
    /// wall clock does.
    pub fn record_success(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        let at = at.max(inner.high_water);
        inner.high_water = at;
        inner.snapshot = HealthSnapshot {
            status: HealthStatus::Ok,
            last_updated: at,
        };
    }

    /// Mark the current cycle failed; the timestamp drops to the epoch.
    pub fn record_failure(&self) {
        self.inner.write().snapshot = HealthSnapshot {
            status: HealthStatus::Failed,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        };
    }

    pub fn status(&self) -> HealthStatus {
        self.inner.read().snapshot.status
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.inner.read().snapshot.last_updated
    }

    /// Read status and timestamp together.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner.read().snapshot
    }

    pub fn response(&self) -> HealthResponse {
        self.snapshot().into()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
