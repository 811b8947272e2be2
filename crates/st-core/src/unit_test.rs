use super::*;
use st_db::{DbResult, DuckDbBackend, Row, SqlDialect};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Session that records every statement it is handed.
#[derive(Default)]
struct RecordingConnection {
    calls: Mutex<Vec<String>>,
}

impl RecordingConnection {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str) {
        self.calls.lock().unwrap().push(sql.to_string());
    }
}

#[async_trait]
impl MigrationConnection for RecordingConnection {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.record(sql);
        Ok(0)
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.record(sql);
        Ok(())
    }

    async fn query_rows(&self, _sql: &str) -> DbResult<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn query_scalar_i64(&self, _sql: &str) -> DbResult<i64> {
        Ok(0)
    }

    async fn relation_exists(&self, _name: &str) -> DbResult<bool> {
        Ok(false)
    }

    async fn begin(&self) -> DbResult<()> {
        self.record("BEGIN");
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        self.record("COMMIT");
        Ok(())
    }

    async fn rollback(&self) -> DbResult<()> {
        self.record("ROLLBACK");
        Ok(())
    }

    async fn try_acquire_lock(&self, _key: i64, _owner: &str) -> DbResult<bool> {
        Ok(true)
    }

    async fn release_lock(&self, _key: i64, _owner: &str) -> DbResult<()> {
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn db_type(&self) -> &'static str {
        "recording"
    }
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

#[test]
fn test_sql_unit_is_transactional_by_default() {
    let unit = MigrationUnit::sql(v("1"), "create t", "CREATE TABLE t (id INT)");
    assert!(unit.is_transactional());
    assert_eq!(unit.version(), &v("1"));
    assert_eq!(unit.description(), "create t");
    assert_eq!(unit.origin(), "code");
}

#[test]
fn test_checksum_ignores_formatting() {
    let a = MigrationUnit::sql(v("1"), "a", "CREATE TABLE t (id INT)");
    let b = MigrationUnit::sql(v("1"), "b", "create table t (\n  id int\n); -- note");
    assert_eq!(a.checksum(), b.checksum());
}

#[test]
fn test_checksum_tracks_body_changes() {
    let a = MigrationUnit::sql(v("3"), "a", "CREATE TABLE t (id INT)");
    let b = MigrationUnit::sql(v("3"), "a", "CREATE TABLE t (id INT, c INT)");
    assert_ne!(a.checksum(), b.checksum());
}

#[test]
fn test_fn_body_checksum_follows_fingerprint() {
    let make = |fp: &str| {
        MigrationUnit::from_fn(v("2"), "fn", true, fp, |conn| {
            Box::pin(async move {
                conn.execute("SELECT 1").await?;
                Ok(())
            })
        })
    };
    assert_eq!(make("backfill v1").checksum(), make("backfill v1").checksum());
    assert_ne!(make("backfill v1").checksum(), make("backfill v2").checksum());
}

#[test]
fn test_with_origin() {
    let unit = MigrationUnit::sql(v("1"), "a", "SELECT 1").with_origin("migrations/V1__a.sql");
    assert_eq!(unit.origin(), "migrations/V1__a.sql");
}

#[tokio::test]
async fn test_sql_body_applies() {
    let db = DuckDbBackend::in_memory().unwrap();
    let unit = MigrationUnit::sql(v("1"), "create t", "CREATE TABLE t (id INT); INSERT INTO t VALUES (1);");
    unit.apply(&db).await.unwrap();
    assert_eq!(db.query_scalar_i64("SELECT COUNT(*) FROM t").await.unwrap(), 1);
}

#[tokio::test]
async fn test_empty_sql_body_is_noop() {
    let db = DuckDbBackend::in_memory().unwrap();
    let unit = MigrationUnit::sql(v("0.29.1"), "placeholder", "-- intentionally empty\n");
    unit.apply(&db).await.unwrap();
}

#[tokio::test]
async fn test_fn_body_runs_closure() {
    let db = DuckDbBackend::in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let unit = MigrationUnit::from_fn(v("1"), "count", true, "count-calls", move |conn| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            conn.execute_batch("CREATE TABLE touched (id INT)").await?;
            Ok(())
        })
    });

    unit.apply(&db).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(db.relation_exists("touched").await.unwrap());
}

#[tokio::test]
async fn test_body_errors_propagate() {
    let db = DuckDbBackend::in_memory().unwrap();
    let unit = MigrationUnit::sql(v("1"), "broken", "ALTER TABLE missing ADD COLUMN c INT");
    let err = unit.apply(&db).await.unwrap_err();
    assert!(matches!(err, BodyError::Db(_)));
}

#[tokio::test]
async fn test_non_transactional_sql_issues_one_call_per_statement() {
    let conn = RecordingConnection::default();
    let unit = MigrationUnit::sql_non_transactional(
        v("5"),
        "concurrent indexes",
        "CREATE INDEX CONCURRENTLY w_a ON w(a);\nCREATE INDEX CONCURRENTLY w_b ON w(b);\n",
    );
    unit.apply(&conn).await.unwrap();
    assert_eq!(
        conn.calls(),
        vec![
            "CREATE INDEX CONCURRENTLY w_a ON w(a)".to_string(),
            "CREATE INDEX CONCURRENTLY w_b ON w(b)".to_string()
        ]
    );
}

#[tokio::test]
async fn test_enum_value_is_committed_before_use() {
    let conn = RecordingConnection::default();
    let unit = MigrationUnit::from_sql(
        v("6"),
        "archived status",
        false,
        "ALTER TYPE status ADD VALUE 'archived';\nUPDATE jobs SET status = 'archived' WHERE stale;",
    );
    unit.apply(&conn).await.unwrap();
    assert_eq!(conn.calls().len(), 2);
    assert!(conn.calls()[1].starts_with("UPDATE jobs"));
}

#[tokio::test]
async fn test_transactional_sql_is_one_call() {
    let conn = RecordingConnection::default();
    let sql = "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);";
    MigrationUnit::sql(v("1"), "create t", sql)
        .apply(&conn)
        .await
        .unwrap();
    assert_eq!(conn.calls(), vec![sql.to_string()]);
}

#[test]
fn test_statement_splitting_does_not_change_checksum() {
    let sql = "CREATE INDEX i ON t(c); CREATE INDEX j ON t(d);";
    let tx = MigrationUnit::sql(v("1"), "a", sql);
    let no_tx = MigrationUnit::sql_non_transactional(v("1"), "a", sql);
    assert_eq!(tx.checksum(), no_tx.checksum());
    assert!(!no_tx.is_transactional());
}
