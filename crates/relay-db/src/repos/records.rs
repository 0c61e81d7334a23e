//! Record repository: the dedup/upsert engine.
//!
//! Records are keyed by `(external_id, tenant)`. An incoming record is
//! inserted when the key is new, overwrites the stored row when it carries
//! newer data, and is otherwise skipped without touching the row.
//!
//! Enrichment is merged, never replaced wholesale: a lookup that failed this
//! time leaves the stored value in place.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use relay_core::entities::{NaturalKey, NormalizedRecord, StoredRecord};
use relay_core::enums::{SyncType, UpsertOutcome};
use relay_core::ids::PREFIX_RECORD;

use crate::error::DatabaseError;
use crate::helpers::{
    get_opt_string, parse_datetime, parse_json_object, parse_optional_datetime, to_db_timestamp,
};
use crate::service::RelayService;

const RECORD_COLUMNS: &str = "id, external_id, tenant, occurred_at, updated_at_source, payload, \
     enrichment, created_at, last_synced";

/// Whether `incoming` should overwrite `existing` (same natural key).
///
/// - Both carry an update time: overwrite only if the incoming one is newer.
/// - Only the incoming one does: overwrite.
/// - The incoming one has none (source does not report updates): overwrite
///   unless the source content is unchanged and the incoming enrichment adds
///   nothing, so re-syncing the same data is a no-op.
#[must_use]
pub fn decide(existing: &StoredRecord, incoming: &NormalizedRecord) -> UpsertOutcome {
    match (incoming.updated_at_source, existing.updated_at_source) {
        (Some(new), Some(old)) if new <= old => UpsertOutcome::Skipped,
        (Some(_), _) => UpsertOutcome::Updated,
        (None, _) => {
            let unchanged = existing.payload == incoming.payload
                && existing.occurred_at == incoming.occurred_at;
            if unchanged && !adds_enrichment(existing, incoming) {
                UpsertOutcome::Skipped
            } else {
                UpsertOutcome::Updated
            }
        }
    }
}

/// True when `incoming` carries a lookup the stored row lacks or holds a
/// different value for. Missing lookups never count.
fn adds_enrichment(existing: &StoredRecord, incoming: &NormalizedRecord) -> bool {
    incoming
        .enrichment
        .iter()
        .any(|(name, value)| existing.enrichment.get(name) != Some(value))
}

/// Stored enrichment overlaid with whatever this sync looked up.
fn merged_enrichment(existing: &StoredRecord, incoming: &NormalizedRecord) -> Map<String, Value> {
    let mut merged = existing.enrichment.clone();
    merged.extend(
        incoming
            .enrichment
            .iter()
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    merged
}

impl RelayService {
    /// Apply one normalized record to the `sync_type` table.
    ///
    /// A concurrent insert of the same key is retried as an update.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a statement fails.
    pub async fn upsert_record(
        &self,
        sync_type: SyncType,
        record: &NormalizedRecord,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let key = record.natural_key();
        let now = Utc::now();

        if let Some(existing) = self.get_record(sync_type, &key).await? {
            return self.apply_to_existing(sync_type, &existing, record, now).await;
        }

        match self.insert_record(sync_type, record, now).await {
            Ok(()) => Ok(UpsertOutcome::Created),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(
                    %sync_type,
                    external_id = %key.external_id,
                    tenant = %key.tenant,
                    "insert lost a race, retrying as update"
                );
                let existing = self.get_record(sync_type, &key).await?.ok_or_else(|| {
                    DatabaseError::InvalidState(format!(
                        "{sync_type} record {} vanished after a unique conflict",
                        key.external_id
                    ))
                })?;
                self.apply_to_existing(sync_type, &existing, record, now).await
            }
            Err(e) => Err(e),
        }
    }

    /// Look up one record by natural key.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the row is malformed.
    pub async fn get_record(
        &self,
        sync_type: SyncType,
        key: &NaturalKey,
    ) -> Result<Option<StoredRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE external_id = ?1 AND tenant = ?2",
            sync_type.table()
        );
        let mut rows = self
            .db()
            .conn()
            .query(&sql, libsql::params![key.external_id.as_str(), key.tenant.as_str()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row, sync_type)?)),
            None => Ok(None),
        }
    }

    /// Most recently occurred records first, optionally for one tenant.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or a row is malformed.
    pub async fn list_records(
        &self,
        sync_type: SyncType,
        tenant: Option<&str>,
        limit: u32,
    ) -> Result<Vec<StoredRecord>, DatabaseError> {
        let table = sync_type.table();
        let mut rows = match tenant {
            Some(tenant) => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM {table} WHERE tenant = ?1
                     ORDER BY occurred_at DESC, external_id LIMIT ?2"
                );
                self.db()
                    .conn()
                    .query(&sql, libsql::params![tenant, i64::from(limit)])
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM {table}
                     ORDER BY occurred_at DESC, external_id LIMIT ?1"
                );
                self.db()
                    .conn()
                    .query(&sql, libsql::params![i64::from(limit)])
                    .await?
            }
        };

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row, sync_type)?);
        }
        Ok(records)
    }

    /// Number of stored records, optionally for one tenant.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_records(
        &self,
        sync_type: SyncType,
        tenant: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let table = sync_type.table();
        let mut rows = match tenant {
            Some(tenant) => {
                let sql = format!("SELECT COUNT(*) FROM {table} WHERE tenant = ?1");
                self.db().conn().query(&sql, [tenant]).await?
            }
            None => {
                let sql = format!("SELECT COUNT(*) FROM {table}");
                self.db().conn().query(&sql, ()).await?
            }
        };
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        crate::helpers::get_count(&row, 0)
    }

    async fn insert_record(
        &self,
        sync_type: SyncType,
        record: &NormalizedRecord,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let id = self.db().generate_id(PREFIX_RECORD).await?;
        let payload = serde_json::to_string(&record.payload)?;
        let enrichment = serde_json::to_string(&record.enrichment)?;
        let now = to_db_timestamp(now);
        let sql = format!(
            "INSERT INTO {} ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            sync_type.table()
        );
        self.db()
            .conn()
            .execute(
                &sql,
                libsql::params![
                    id.as_str(),
                    record.external_id.as_str(),
                    record.tenant.as_str(),
                    to_db_timestamp(record.occurred_at),
                    record.updated_at_source.map(to_db_timestamp),
                    payload,
                    enrichment,
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn apply_to_existing(
        &self,
        sync_type: SyncType,
        existing: &StoredRecord,
        record: &NormalizedRecord,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let outcome = decide(existing, record);
        if outcome == UpsertOutcome::Skipped {
            return Ok(outcome);
        }

        let payload = serde_json::to_string(&record.payload)?;
        let enrichment = serde_json::to_string(&merged_enrichment(existing, record))?;
        let sql = format!(
            "UPDATE {} SET occurred_at = ?1, updated_at_source = ?2, payload = ?3,
             enrichment = ?4, last_synced = ?5
             WHERE id = ?6",
            sync_type.table()
        );
        self.db()
            .conn()
            .execute(
                &sql,
                libsql::params![
                    to_db_timestamp(record.occurred_at),
                    record.updated_at_source.map(to_db_timestamp),
                    payload,
                    enrichment,
                    to_db_timestamp(now),
                    existing.id.as_str(),
                ],
            )
            .await?;
        Ok(outcome)
    }
}

fn row_to_record(row: &libsql::Row, sync_type: SyncType) -> Result<StoredRecord, DatabaseError> {
    Ok(StoredRecord {
        id: row.get::<String>(0)?,
        sync_type,
        external_id: row.get::<String>(1)?,
        tenant: row.get::<String>(2)?,
        occurred_at: parse_datetime(&row.get::<String>(3)?)?,
        updated_at_source: parse_optional_datetime(get_opt_string(row, 4)?.as_deref())?,
        payload: parse_json_object(&row.get::<String>(5)?)?,
        enrichment: parse_json_object(&row.get::<String>(6)?)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        last_synced: parse_datetime(&row.get::<String>(8)?)?,
    })
}
