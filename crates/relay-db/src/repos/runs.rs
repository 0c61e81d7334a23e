//! Run log repository.
//!
//! Manages the `sync_runs` lifecycle: start (with orphan recovery), counter
//! checkpoints, finish, and history queries. Only [`RelayService::finish_run`]
//! sets `completed_at`, `duration_seconds`, and a terminal status, and it does
//! so exactly once per run.

use chrono::Utc;

use relay_core::entities::{RunCounters, SyncRun};
use relay_core::enums::{RunStatus, SyncType};
use relay_core::ids::PREFIX_RUN;
use relay_core::window::Window;

use crate::error::DatabaseError;
use crate::helpers::{
    count_param, get_count, get_opt_string, parse_datetime, parse_enum, parse_optional_datetime,
    to_db_timestamp,
};
use crate::service::RelayService;

/// Error message recorded on runs recovered from a crashed process.
pub const INTERRUPTED_MESSAGE: &str = "interrupted: run did not complete";

const RUN_COLUMNS: &str = "id, sync_type, tenant, start_date, end_date, events_fetched, \
     events_created, events_updated, events_skipped, status, started_at, completed_at, \
     duration_seconds, error_message, api_calls_made";

/// History query. Unset fields do not filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFilter {
    pub sync_type: Option<SyncType>,
    pub tenant: Option<String>,
    pub status: Option<RunStatus>,
    pub limit: u32,
}

impl Default for RunFilter {
    fn default() -> Self {
        Self {
            sync_type: None,
            tenant: None,
            status: None,
            limit: 20,
        }
    }
}

impl RelayService {
    /// Start a run in `running` status with zeroed counters.
    ///
    /// Any run still `running` for the same `(sync_type, tenant)` was left by
    /// a process that died mid-run; it is finished as `failed` first. Returns
    /// the new run and the recovered ones.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if database operations fail.
    pub async fn start_run(
        &self,
        sync_type: SyncType,
        tenant: &str,
        window: Window,
    ) -> Result<(SyncRun, Vec<SyncRun>), DatabaseError> {
        let mut recovered = Vec::new();
        for orphan in self.detect_orphan_runs(sync_type, tenant).await? {
            tracing::warn!(
                run_id = %orphan.id,
                %sync_type,
                tenant,
                "recovering run left in running state"
            );
            recovered.push(
                self.finish_run(&orphan.id, RunStatus::Failed, Some(INTERRUPTED_MESSAGE))
                    .await?,
            );
        }

        let id = self.db().generate_id(PREFIX_RUN).await?;
        let now = Utc::now();
        self.db()
            .conn()
            .execute(
                "INSERT INTO sync_runs
                     (id, sync_type, tenant, start_date, end_date, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'running', ?6)",
                libsql::params![
                    id.as_str(),
                    sync_type.as_str(),
                    tenant,
                    to_db_timestamp(window.start()),
                    to_db_timestamp(window.end()),
                    to_db_timestamp(now),
                ],
            )
            .await?;

        let run = SyncRun {
            id,
            sync_type,
            tenant: tenant.to_string(),
            window,
            status: RunStatus::Running,
            counters: RunCounters::default(),
            api_calls_made: 0,
            started_at: now,
            completed_at: None,
            duration_seconds: None,
            error_message: None,
        };
        Ok((run, recovered))
    }

    /// Checkpoint the counters of a running run.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the run is not `running`.
    pub async fn update_run_counters(
        &self,
        run_id: &str,
        counters: &RunCounters,
        api_calls_made: u64,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE sync_runs SET events_fetched = ?1, events_created = ?2, events_updated = ?3,
                 events_skipped = ?4, api_calls_made = ?5
                 WHERE id = ?6 AND status = 'running'",
                libsql::params![
                    count_param(counters.fetched),
                    count_param(counters.created),
                    count_param(counters.updated),
                    count_param(counters.skipped),
                    count_param(api_calls_made),
                    run_id,
                ],
            )
            .await?;
        if changed == 0 {
            return Err(self.not_running(run_id, "update counters of").await);
        }
        Ok(())
    }

    /// Move a running run to a terminal status.
    ///
    /// Counters are left as last checkpointed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if `status` is not terminal or
    /// the run was already finished, and `DatabaseError::NoResult` if the run
    /// does not exist.
    pub async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<SyncRun, DatabaseError> {
        let current = self.get_run(run_id).await?;
        if !current.status.can_transition_to(status) {
            return Err(DatabaseError::InvalidState(format!(
                "Cannot transition run {run_id} from {} to {status}",
                current.status
            )));
        }

        let now = Utc::now();
        let duration = (now - current.started_at).num_microseconds().map_or(0.0, |us| {
            #[allow(clippy::cast_precision_loss)]
            let secs = us as f64 / 1_000_000.0;
            secs.max(0.0)
        });

        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE sync_runs SET status = ?1, completed_at = ?2, duration_seconds = ?3,
                 error_message = ?4
                 WHERE id = ?5 AND status = 'running'",
                libsql::params![
                    status.as_str(),
                    to_db_timestamp(now),
                    duration,
                    error_message,
                    run_id,
                ],
            )
            .await?;
        if changed == 0 {
            return Err(self.not_running(run_id, "finish").await);
        }

        Ok(SyncRun {
            status,
            completed_at: Some(now),
            duration_seconds: Some(duration),
            error_message: error_message.map(String::from),
            ..current
        })
    }

    /// Get a run by ID.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the run does not exist.
    pub async fn get_run(&self, id: &str) -> Result<SyncRun, DatabaseError> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?1");
        let mut rows = self.db().conn().query(&sql, [id]).await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_run(&row)
    }

    /// Runs matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or a row is malformed.
    pub async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<SyncRun>, DatabaseError> {
        let mut clauses = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(sync_type) = filter.sync_type {
            params.push(sync_type.as_str().into());
            clauses.push(format!("sync_type = ?{}", params.len()));
        }
        if let Some(tenant) = &filter.tenant {
            params.push(tenant.as_str().into());
            clauses.push(format!("tenant = ?{}", params.len()));
        }
        if let Some(status) = filter.status {
            params.push(status.as_str().into());
            clauses.push(format!("status = ?{}", params.len()));
        }
        params.push(i64::from(filter.limit).into());
        let limit_idx = params.len();

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM sync_runs {where_clause}
             ORDER BY started_at DESC, rowid DESC LIMIT ?{limit_idx}"
        );

        let mut rows = self
            .db()
            .conn()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(row_to_run(&row)?);
        }
        Ok(runs)
    }

    /// The newest `success` run for the pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn latest_successful_run(
        &self,
        sync_type: SyncType,
        tenant: &str,
    ) -> Result<Option<SyncRun>, DatabaseError> {
        let filter = RunFilter {
            sync_type: Some(sync_type),
            tenant: Some(tenant.to_string()),
            status: Some(RunStatus::Success),
            limit: 1,
        };
        Ok(self.list_runs(&filter).await?.into_iter().next())
    }

    async fn detect_orphan_runs(
        &self,
        sync_type: SyncType,
        tenant: &str,
    ) -> Result<Vec<SyncRun>, DatabaseError> {
        let filter = RunFilter {
            sync_type: Some(sync_type),
            tenant: Some(tenant.to_string()),
            status: Some(RunStatus::Running),
            limit: 100,
        };
        self.list_runs(&filter).await
    }

    /// Explain why a `WHERE status = 'running'` write touched nothing.
    async fn not_running(&self, run_id: &str, action: &str) -> DatabaseError {
        match self.get_run(run_id).await {
            Ok(run) => DatabaseError::InvalidState(format!(
                "Cannot {action} run {run_id}: already {}",
                run.status
            )),
            Err(e) => e,
        }
    }
}

fn row_to_run(row: &libsql::Row) -> Result<SyncRun, DatabaseError> {
    let start = parse_datetime(&row.get::<String>(3)?)?;
    let end = parse_datetime(&row.get::<String>(4)?)?;
    let window = Window::new(start, end)
        .map_err(|e| DatabaseError::InvalidState(format!("stored run window: {e}")))?;

    Ok(SyncRun {
        id: row.get::<String>(0)?,
        sync_type: parse_enum(&row.get::<String>(1)?)?,
        tenant: row.get::<String>(2)?,
        window,
        counters: RunCounters {
            fetched: get_count(row, 5)?,
            created: get_count(row, 6)?,
            updated: get_count(row, 7)?,
            skipped: get_count(row, 8)?,
        },
        status: parse_enum(&row.get::<String>(9)?)?,
        started_at: parse_datetime(&row.get::<String>(10)?)?,
        completed_at: parse_optional_datetime(get_opt_string(row, 11)?.as_deref())?,
        duration_seconds: row.get::<Option<f64>>(12)?,
        error_message: get_opt_string(row, 13)?,
        api_calls_made: get_count(row, 14)?,
    })
}
