//! Status and classification enums.
//!
//! All enums use `snake_case` serialization, which is also their SQL storage
//! form. [`RunStatus`] carries its state machine via `allowed_next_states()`.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

// ---------------------------------------------------------------------------
// SyncType
// ---------------------------------------------------------------------------

/// The external record stream a run pulls from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    FormSubmissions,
    ScheduledEvents,
    CallRecords,
}

impl SyncType {
    pub const ALL: [Self; 3] = [
        Self::FormSubmissions,
        Self::ScheduledEvents,
        Self::CallRecords,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FormSubmissions => "form_submissions",
            Self::ScheduledEvents => "scheduled_events",
            Self::CallRecords => "call_records",
        }
    }

    /// Table holding this stream's stored records.
    ///
    /// Exhaustive on purpose: a new stream must name its table.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::FormSubmissions => "form_submissions",
            Self::ScheduledEvents => "scheduled_events",
            Self::CallRecords => "call_records",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form_submissions" | "forms" | "submissions" => Ok(Self::FormSubmissions),
            "scheduled_events" | "scheduling" | "events" => Ok(Self::ScheduledEvents),
            "call_records" | "calls" => Ok(Self::CallRecords),
            other => Err(SyncError::invalid_field(
                "sync_type",
                format!("unknown sync type '{other}'"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Status of a sync run.
///
/// ```text
/// running → success
///         → partial
///         → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Running => &[Self::Success, Self::Partial, Self::Failed],
            Self::Success | Self::Partial | Self::Failed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// UpsertOutcome
// ---------------------------------------------------------------------------

/// What the dedup engine did with one normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

impl UpsertOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_reaches_every_terminal_state() {
        for next in [RunStatus::Success, RunStatus::Partial, RunStatus::Failed] {
            assert!(RunStatus::Running.can_transition_to(next));
        }
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Running));
    }

    #[test]
    fn terminal_states_are_final() {
        for status in [RunStatus::Success, RunStatus::Partial, RunStatus::Failed] {
            assert!(status.is_terminal());
            assert!(status.allowed_next_states().is_empty());
        }
    }

    #[test]
    fn sync_type_aliases_parse() {
        assert_eq!("forms".parse::<SyncType>().unwrap(), SyncType::FormSubmissions);
        assert_eq!("events".parse::<SyncType>().unwrap(), SyncType::ScheduledEvents);
        assert_eq!("calls".parse::<SyncType>().unwrap(), SyncType::CallRecords);
        assert_eq!(
            "call_records".parse::<SyncType>().unwrap(),
            SyncType::CallRecords
        );
    }

    #[test]
    fn unknown_sync_type_is_validation_error() {
        let err = "faxes".parse::<SyncType>().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn as_str_matches_serde() {
        for sync_type in SyncType::ALL {
            let json = serde_json::to_value(sync_type).unwrap();
            assert_eq!(json, sync_type.as_str());
        }
        let json = serde_json::to_value(RunStatus::Partial).unwrap();
        assert_eq!(json, "partial");
    }
}
