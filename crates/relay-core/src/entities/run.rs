use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{RunStatus, SyncType, UpsertOutcome};
use crate::window::Window;

/// Per-run record counters.
///
/// At successful completion `fetched == created + updated + skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunCounters {
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl RunCounters {
    /// Count one fetched record and its dedup outcome.
    pub const fn record(&mut self, outcome: UpsertOutcome) {
        self.fetched += 1;
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    pub const fn merge(&mut self, other: &Self) {
        self.fetched += other.fetched;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }

    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.fetched == self.created + self.updated + self.skipped
    }
}

/// One invocation of the orchestrator for one source, tenant, and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SyncRun {
    pub id: String,
    pub sync_type: SyncType,
    pub tenant: String,
    pub window: Window,
    pub status: RunStatus,
    pub counters: RunCounters,
    pub api_calls_made: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}
