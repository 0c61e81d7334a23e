//! Orchestrator runs against scripted adapters and an in-memory store.

mod common;

use std::time::Duration;

use chrono::TimeDelta;
use pretty_assertions::assert_eq;
use relay_core::entities::{NaturalKey, RunCounters};
use relay_core::enums::{RunStatus, SyncType};
use relay_core::errors::SyncError;
use relay_core::window::Window;
use relay_db::repos::{INTERRUPTED_MESSAGE, RunFilter};
use relay_sources::RateLimitHint;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{ScriptedAdapter, Step, at, engine, engine_with, fast_settings, ok, page, rec, week};

#[tokio::test]
async fn pages_apply_in_order_and_run_succeeds() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![
        page(vec![ok("A"), ok("B")], Some("p2")),
        page(vec![ok("C")], None),
    ]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(
        run.counters,
        RunCounters {
            fetched: 3,
            created: 3,
            updated: 0,
            skipped: 0,
        }
    );
    assert!(run.counters.is_balanced());
    assert_eq!(run.api_calls_made, 2);
    assert!(run.completed_at.is_some());
    assert_eq!(run.error_message, None);
    assert_eq!(adapter.fetched_cursors(), vec![None, Some("p2".to_string())]);
    assert_eq!(
        engine.store().count_records(SyncType::CallRecords, Some("acme")).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn repeated_key_across_pages_keeps_newest() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![
        page(
            vec![
                Ok(rec("A", Some(10), json!({"rev": 1}))),
                Ok(rec("B", Some(10), json!({"rev": 1}))),
            ],
            Some("2"),
        ),
        page(vec![Ok(rec("A", Some(11), json!({"rev": 2})))], None),
    ]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(
        run.counters,
        RunCounters {
            fetched: 3,
            created: 2,
            updated: 1,
            skipped: 0,
        }
    );
    let a = engine
        .store()
        .get_record(SyncType::CallRecords, &NaturalKey::new("A", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.payload["rev"], 2);
}

#[tokio::test]
async fn rerunning_the_same_window_changes_nothing() {
    let engine = engine().await;
    let script = || {
        vec![page(
            vec![
                Ok(rec("A", Some(10), json!({"rev": 1}))),
                Ok(rec("B", None, json!({"rev": 1}))),
                Ok(rec("C", Some(12), json!({"rev": 4}))),
            ],
            None,
        )]
    };

    let first = engine
        .run(&ScriptedAdapter::new(script()), week(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.counters.created, 3);

    let second = engine
        .run(&ScriptedAdapter::new(script()), week(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        second.counters,
        RunCounters {
            fetched: 3,
            created: 0,
            updated: 0,
            skipped: 3,
        }
    );
}

#[tokio::test]
async fn transient_fetch_failure_is_retried() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![
        Step::Fail(SyncError::network("connection reset")),
        Step::Fail(SyncError::remote_api(503, "unavailable", None)),
        page(vec![ok("A")], None),
    ]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.api_calls_made, 3);
    assert_eq!(adapter.fetched_cursors(), vec![None, None, None]);
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_attempts_and_fails() {
    let engine = engine().await;
    let limited = || Step::Fail(SyncError::rate_limited(60, None));
    let adapter = ScriptedAdapter::new(vec![limited(), limited(), limited(), limited()]);

    let started = std::time::Instant::now();
    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.api_calls_made, 3);
    assert_eq!(adapter.fetch_count(), 3);
    assert_eq!(run.counters, RunCounters::default());
    assert!(run.error_message.unwrap().contains("429"));
    // Retry-After of 60s is capped by the 5ms max delay.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn abandoned_chunk_after_progress_is_partial() {
    let settings = relay_sync::EngineSettings {
        chunk: TimeDelta::days(1),
        ..fast_settings()
    };
    let engine = engine_with(settings).await;
    let window = Window::new(at(1, 0), at(4, 0)).unwrap();
    let down = || Step::Fail(SyncError::network("connection refused"));
    let adapter = ScriptedAdapter::new(vec![
        page(vec![ok("A")], None),
        down(),
        down(),
        down(),
        page(vec![ok("B")], None),
    ]);

    let run = engine.run(&adapter, window, &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.counters.fetched, 2);
    assert_eq!(run.counters.created, 2);
    assert_eq!(run.api_calls_made, 5);
    assert!(run.error_message.unwrap().contains("connection refused"));

    let starts: Vec<_> = adapter.fetched_windows().iter().map(Window::start).collect();
    assert_eq!(starts, vec![at(1, 0), at(2, 0), at(2, 0), at(2, 0), at(3, 0)]);
}

#[tokio::test]
async fn nothing_completed_is_failed() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![Step::Fail(SyncError::remote_api(
        400,
        "bad request",
        None,
    ))]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.api_calls_made, 1, "4xx is not retried");
}

#[tokio::test]
async fn authentication_failure_stops_immediately() {
    let settings = relay_sync::EngineSettings {
        chunk: TimeDelta::days(1),
        ..fast_settings()
    };
    let engine = engine_with(settings).await;
    let adapter = ScriptedAdapter::new(vec![
        page(vec![ok("A")], None),
        Step::Fail(SyncError::authentication("token revoked")),
        page(vec![ok("B")], None),
    ]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(adapter.fetch_count(), 2);
    assert_eq!(run.counters.created, 1, "completed pages stay counted");
    assert!(run.error_message.unwrap().contains("token revoked"));
}

#[tokio::test]
async fn unprocessable_record_is_skipped() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(
        vec![
            ok("A"),
            Err(SyncError::data_processing(Some("evt-9"), "missing started_at")),
            ok("B"),
        ],
        None,
    )]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(
        run.counters,
        RunCounters {
            fetched: 3,
            created: 2,
            updated: 0,
            skipped: 1,
        }
    );
}

#[tokio::test]
async fn page_level_error_writes_nothing_from_that_page() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(
        vec![
            ok("A"),
            Err(SyncError::sync_operation("decode_page", "truncated body", false)),
        ],
        None,
    )]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.counters, RunCounters::default());
    assert_eq!(
        engine.store().count_records(SyncType::CallRecords, None).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn stalled_fetch_times_out_and_is_retried() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![
        Step::Stall(Duration::from_secs(30)),
        page(vec![ok("A")], None),
    ]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.api_calls_made, 2);
    assert_eq!(run.counters.created, 1);
}

#[tokio::test]
async fn cancelled_before_first_fetch_is_partial() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(vec![ok("A")], None)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let run = engine.run(&adapter, week(), &cancel).await.unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(adapter.fetch_count(), 0);
    assert_eq!(run.error_message.as_deref(), Some("cancelled before completion"));
}

#[tokio::test]
async fn cancel_during_fetch_keeps_completed_pages() {
    let settings = relay_sync::EngineSettings {
        fetch_timeout: Duration::from_secs(30),
        ..fast_settings()
    };
    let engine = engine_with(settings).await;
    let adapter = ScriptedAdapter::new(vec![
        page(vec![ok("A")], Some("2")),
        Step::Stall(Duration::from_secs(30)),
    ]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let run = engine.run(&adapter, week(), &cancel).await.unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.counters.created, 1);
    assert_eq!(adapter.fetch_count(), 2);
}

#[tokio::test]
async fn exhausted_rate_budget_pauses_then_continues() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![
        Step::Page {
            records: vec![ok("A")],
            next: Some("2"),
            rate_limit: Some(RateLimitHint {
                remaining: Some(0),
                reset_after_secs: Some(120),
            }),
        },
        page(vec![ok("B")], None),
    ]);

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.counters.created, 2);
}

#[tokio::test]
async fn same_pair_runs_are_serialized() {
    let settings = relay_sync::EngineSettings {
        fetch_timeout: Duration::from_secs(5),
        ..fast_settings()
    };
    let engine = engine_with(settings).await;
    let slow = ScriptedAdapter::new(vec![Step::Stall(Duration::from_millis(300))]);
    let other = ScriptedAdapter::new(vec![]);
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        engine.run(&slow, week(), &cancel),
        engine.run(&other, week(), &cancel)
    );

    let (won, lost) = match (a, b) {
        (Ok(run), Err(e)) | (Err(e), Ok(run)) => (run, e),
        other => panic!("expected exactly one run to get the lease: {other:?}"),
    };
    assert_eq!(won.status, RunStatus::Success);
    assert!(lost.is_retryable());
    assert_eq!(lost.context()["operation"], "acquire_lease");

    let runs = engine.store().list_runs(&RunFilter::default()).await.unwrap();
    assert_eq!(runs.len(), 1, "a run that never got the lease is not logged");
}

#[tokio::test]
async fn different_tenants_run_concurrently() {
    let settings = relay_sync::EngineSettings {
        fetch_timeout: Duration::from_secs(5),
        ..fast_settings()
    };
    let engine = engine_with(settings).await;
    let acme = ScriptedAdapter::new(vec![Step::Stall(Duration::from_millis(200))]);
    let globex =
        ScriptedAdapter::new(vec![Step::Stall(Duration::from_millis(200))]).with_tenant("globex");
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        engine.run(&acme, week(), &cancel),
        engine.run(&globex, week(), &cancel)
    );

    assert_eq!(a.unwrap().status, RunStatus::Success);
    assert_eq!(b.unwrap().tenant, "globex");
}

#[tokio::test]
async fn enrichment_is_looked_up_once_per_key() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(
        vec![
            Ok(rec("A", None, json!({"owner": "u1"}))),
            Ok(rec("B", None, json!({"owner": "u1"}))),
            Ok(rec("C", None, json!({"owner": "u2"}))),
            Ok(rec("D", None, json!({}))),
        ],
        None,
    )])
    .with_enrichment(Ok(json!({"name": "Dana"})));

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(adapter.lookup_count(), 2);
    assert_eq!(run.api_calls_made, 3, "one page plus two lookups");

    let b = engine
        .store()
        .get_record(SyncType::CallRecords, &NaturalKey::new("B", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.enrichment["owner_details"], json!({"name": "Dana"}));
    let d = engine
        .store()
        .get_record(SyncType::CallRecords, &NaturalKey::new("D", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert!(d.enrichment.is_empty());
}

#[tokio::test]
async fn source_field_named_like_the_lookup_is_preserved() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(
        vec![Ok(rec(
            "A",
            None,
            json!({"owner": "u1", "owner_details": "sent by the source"}),
        ))],
        None,
    )])
    .with_enrichment(Ok(json!({"name": "Ann"})));

    engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    let a = engine
        .store()
        .get_record(SyncType::CallRecords, &NaturalKey::new("A", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.payload["owner_details"], "sent by the source");
    assert_eq!(a.enrichment["owner_details"], json!({"name": "Ann"}));
}

#[tokio::test]
async fn failed_lookup_on_rerun_keeps_stored_enrichment() {
    let engine = engine().await;
    let script = || vec![page(vec![Ok(rec("A", None, json!({"owner": "u1"})))], None)];

    let first = ScriptedAdapter::new(script()).with_enrichment(Ok(json!({"name": "Ann"})));
    engine.run(&first, week(), &CancellationToken::new()).await.unwrap();

    engine.clear_cache();
    let flaky = ScriptedAdapter::new(script())
        .with_enrichment(Err(SyncError::network("connection reset")));
    let rerun = engine.run(&flaky, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(rerun.status, RunStatus::Success);
    assert_eq!(
        rerun.counters,
        RunCounters {
            fetched: 1,
            created: 0,
            updated: 0,
            skipped: 1,
        }
    );
    let a = engine
        .store()
        .get_record(SyncType::CallRecords, &NaturalKey::new("A", "acme"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.enrichment["owner_details"], json!({"name": "Ann"}));
}

#[tokio::test]
async fn failed_enrichment_still_applies_record() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(
        vec![
            Ok(rec("A", None, json!({"owner": "u1"}))),
            Ok(rec("B", None, json!({"owner": "u1"}))),
        ],
        None,
    )])
    .with_enrichment(Err(SyncError::remote_api(404, "no such user", None)));

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.counters.created, 2);
    assert_eq!(adapter.lookup_count(), 2, "failures are not cached");
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn unauthorized_enrichment_fails_the_run() {
    let engine = engine().await;
    let adapter = ScriptedAdapter::new(vec![page(
        vec![Ok(rec("A", None, json!({"owner": "u1"})))],
        None,
    )])
    .with_enrichment(Err(SyncError::authorization("scope users:read missing")));

    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        engine.store().count_records(SyncType::CallRecords, None).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn record_the_store_cannot_apply_is_skipped_alone() {
    let engine = engine().await;
    engine
        .store()
        .db()
        .conn()
        .execute(
            "INSERT INTO call_records
                 (id, external_id, tenant, occurred_at, payload, created_at, last_synced)
             VALUES ('rec-bad', 'A', 'acme', '2026-03-02T09:00:00Z', '[1]',
                     '2026-03-02T09:00:00Z', '2026-03-02T09:00:00Z')",
            (),
        )
        .await
        .unwrap();

    let adapter = ScriptedAdapter::new(vec![page(vec![ok("B"), ok("A"), ok("C")], None)]);
    let run = engine.run(&adapter, week(), &CancellationToken::new()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(
        run.counters,
        RunCounters {
            fetched: 3,
            created: 2,
            updated: 0,
            skipped: 1,
        }
    );
    assert_eq!(
        engine.store().count_records(SyncType::CallRecords, Some("acme")).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn run_left_running_by_a_dead_process_is_recovered() {
    let engine = engine().await;
    let (orphan, _) = engine
        .store()
        .start_run(SyncType::CallRecords, "acme", week())
        .await
        .unwrap();

    let run = engine
        .run(&ScriptedAdapter::new(vec![]), week(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);

    let recovered = engine.store().get_run(&orphan.id).await.unwrap();
    assert_eq!(recovered.status, RunStatus::Failed);
    assert_eq!(recovered.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
}

#[tokio::test]
async fn clearing_the_cache_forces_fresh_lookups() {
    let engine = engine().await;
    let script = || {
        vec![page(vec![Ok(rec("A", None, json!({"owner": "u1"})))], None)]
    };

    let first = ScriptedAdapter::new(script()).with_enrichment(Ok(json!("x")));
    engine.run(&first, week(), &CancellationToken::new()).await.unwrap();
    assert_eq!(engine.cache().len(), 1);

    let cached = ScriptedAdapter::new(script()).with_enrichment(Ok(json!("x")));
    engine.run(&cached, week(), &CancellationToken::new()).await.unwrap();
    assert_eq!(cached.lookup_count(), 0);

    engine.clear_cache();
    let fresh = ScriptedAdapter::new(script()).with_enrichment(Ok(json!("x")));
    engine.run(&fresh, week(), &CancellationToken::new()).await.unwrap();
    assert_eq!(fresh.lookup_count(), 1);
}
