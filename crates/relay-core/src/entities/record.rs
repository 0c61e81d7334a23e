use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::SyncType;
use crate::errors::SyncError;

/// Deduplication key: the source-assigned id scoped to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct NaturalKey {
    pub external_id: String,
    pub tenant: String,
}

impl NaturalKey {
    pub fn new(external_id: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            tenant: tenant.into(),
        }
    }
}

/// One record as produced by a source adapter.
///
/// `external_id` is never empty and `occurred_at` is always present; the
/// constructor enforces both. Source fields are kept verbatim in `payload`;
/// lookups attached by the orchestrator go to `enrichment`, keyed by the
/// adapter's enrichment name, so they never shadow a source field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedRecord {
    pub external_id: String,
    pub tenant: String,
    pub occurred_at: DateTime<Utc>,
    pub updated_at_source: Option<DateTime<Utc>>,
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub enrichment: Map<String, Value>,
}

impl NormalizedRecord {
    /// # Errors
    ///
    /// Returns `SyncError::DataProcessing` if `external_id` is blank and
    /// `SyncError::Validation` if `tenant` is blank.
    pub fn new(
        external_id: impl Into<String>,
        tenant: impl Into<String>,
        occurred_at: DateTime<Utc>,
        updated_at_source: Option<DateTime<Utc>>,
        payload: Map<String, Value>,
    ) -> Result<Self, SyncError> {
        let external_id = external_id.into();
        if external_id.trim().is_empty() {
            return Err(SyncError::data_processing(None, "external_id is empty"));
        }
        let tenant = tenant.into();
        if tenant.trim().is_empty() {
            return Err(SyncError::invalid_field("tenant", "tenant is empty"));
        }
        Ok(Self {
            external_id,
            tenant,
            occurred_at,
            updated_at_source,
            payload,
            enrichment: Map::new(),
        })
    }

    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.external_id.clone(), self.tenant.clone())
    }
}

/// A record persisted by the dedup engine. Never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoredRecord {
    pub id: String,
    pub sync_type: SyncType,
    pub external_id: String,
    pub tenant: String,
    pub occurred_at: DateTime<Utc>,
    pub updated_at_source: Option<DateTime<Utc>>,
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub enrichment: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_synced: DateTime<Utc>,
}

impl StoredRecord {
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.external_id.clone(), self.tenant.clone())
    }
}
