//! Engine runs against a live Postgres.
//!
//! Built with `--features postgres`; each test skips unless
//! `STRATUM_TEST_POSTGRES_URL` names a disposable database.
#![cfg(feature = "postgres")]

use st_core::{MigrateError, MigrationRegistry, Version};
use st_db::{MigrationConnection, PostgresBackend};
use st_engine::{EngineConfig, ExecutionEngine, RunOptions, UnitState};
use std::sync::Arc;
use std::time::Duration;

const URL_VAR: &str = "STRATUM_TEST_POSTGRES_URL";

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

async fn connect(schema: &str) -> Option<Arc<PostgresBackend>> {
    let Ok(url) = std::env::var(URL_VAR) else {
        eprintln!("{URL_VAR} not set; skipping");
        return None;
    };
    let db = PostgresBackend::connect(&url).await.unwrap();
    db.execute_batch(&format!(
        "DROP SCHEMA IF EXISTS {schema} CASCADE; CREATE SCHEMA {schema}; SET search_path TO {schema}"
    ))
    .await
    .unwrap();
    Some(Arc::new(db))
}

fn config(lock_key: i64) -> EngineConfig {
    let mut config = EngineConfig::default().with_lock_timeout(Duration::from_millis(300));
    config.lock_key = lock_key;
    config
}

#[tokio::test]
async fn test_non_transactional_statements_run_separately() {
    let Some(db) = connect("st_engine_notx").await else {
        return;
    };
    let engine = ExecutionEngine::new(db.clone(), config(73_020_001));
    let registry = MigrationRegistry::new()
        .register_sql(
            "1",
            "create widget",
            true,
            "CREATE TABLE w (a INT, b INT, status TEXT);
             CREATE TYPE widget_status AS ENUM ('active');",
        )
        .register_sql(
            "2",
            "index widget",
            false,
            "CREATE INDEX CONCURRENTLY w_a ON w(a);\nCREATE INDEX CONCURRENTLY w_b ON w(b);\n",
        )
        .register_sql(
            "3",
            "archived status",
            false,
            "ALTER TYPE widget_status ADD VALUE 'archived';\nSELECT 'archived'::widget_status;",
        );

    let report = engine.run(&registry, &RunOptions::default()).await.unwrap();
    assert_eq!(report.applied_count(), 3);
    let indexes = db
        .query_scalar_i64(
            "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = 'st_engine_notx' AND tablename = 'w'",
        )
        .await
        .unwrap();
    assert_eq!(indexes, 2);
}

#[tokio::test]
async fn test_history_round_trip() {
    let Some(db) = connect("st_engine_history").await else {
        return;
    };
    let engine = ExecutionEngine::new(db.clone(), config(73_020_002));
    let registry = MigrationRegistry::new()
        .register_sql("0.50.24.8", "create t", true, "CREATE TABLE t (id INT)")
        .register_sql("0.50.24.10", "add c", true, "ALTER TABLE t ADD COLUMN c TEXT")
        .register_sql("0.50.25", "index c", false, "CREATE INDEX CONCURRENTLY t_c ON t(c)");

    engine.run(&registry, &RunOptions::default()).await.unwrap();

    let history = engine.history().load_applied(db.as_ref()).await.unwrap();
    let versions: Vec<_> = history.iter().map(|r| r.version.clone()).collect();
    assert_eq!(versions, vec![v("0.50.24.8"), v("0.50.24.10"), v("0.50.25")]);
    let units = registry.discover().unwrap();
    for (record, unit) in history.iter().zip(&units) {
        assert!(record.success);
        assert_eq!(record.checksum, unit.checksum());
        assert!(record.execution_time_ms >= 0);
    }

    let info = engine.info(&registry).await.unwrap();
    assert_eq!(info.count(UnitState::Success), 3);
    assert!(info.entries.iter().all(|e| e.applied_at.is_some()));
    assert_eq!(info.entries[2].transactional, Some(false));

    let rerun = engine.run(&registry, &RunOptions::default()).await.unwrap();
    assert_eq!(rerun.applied_count(), 0);
}

#[tokio::test]
async fn test_advisory_lock_blocks_second_connection() {
    let Some(holder) = connect("st_engine_lock_holder").await else {
        return;
    };
    let Some(db) = connect("st_engine_lock").await else {
        return;
    };
    let key = 73_020_003;
    assert!(holder.try_acquire_lock(key, "holder").await.unwrap());

    let engine = ExecutionEngine::new(db.clone(), config(key));
    let registry = MigrationRegistry::new().register_sql("1", "create t", true, "CREATE TABLE t (id INT)");
    let err = engine
        .run(&registry, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::LockContention { .. }), "got {err:?}");
    assert!(!db.relation_exists("stratum_schema_history").await.unwrap());

    holder.release_lock(key, "holder").await.unwrap();
    let report = engine.run(&registry, &RunOptions::default()).await.unwrap();
    assert_eq!(report.applied_count(), 1);
}
