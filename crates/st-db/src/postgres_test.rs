//! Runs only when `STRATUM_TEST_POSTGRES_URL` points at a disposable database.

use super::*;

const URL_VAR: &str = "STRATUM_TEST_POSTGRES_URL";

/// Connect and reset `schema` as this session's search path, or `None` to skip.
async fn connect(schema: &str) -> Option<PostgresBackend> {
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
    Some(db)
}

#[tokio::test]
async fn test_advisory_lock_is_exclusive_across_connections() {
    let Some(first) = connect("st_db_lock").await else {
        return;
    };
    let Some(second) = connect("st_db_lock_other").await else {
        return;
    };

    assert!(first.try_acquire_lock(73_010_001, "first").await.unwrap());
    assert!(!second.try_acquire_lock(73_010_001, "second").await.unwrap());

    first.release_lock(73_010_001, "first").await.unwrap();
    assert!(second.try_acquire_lock(73_010_001, "second").await.unwrap());
    second.release_lock(73_010_001, "second").await.unwrap();
}

#[tokio::test]
async fn test_rows_decode_as_text() {
    let Some(db) = connect("st_db_rows").await else {
        return;
    };
    db.execute_batch(
        "CREATE TABLE h (version VARCHAR(50), success BOOLEAN, installed_on TIMESTAMPTZ, note TEXT);
         INSERT INTO h VALUES ('1.2', true, to_timestamp(1700000000.123), NULL),
                              ('1.3', false, to_timestamp(1700000001.5), 'x');",
    )
    .await
    .unwrap();

    let sql = format!(
        "SELECT version, CASE WHEN success THEN 1 ELSE 0 END, {}, note FROM h ORDER BY version",
        SqlDialect::Postgres.epoch_millis("installed_on")
    );
    let rows = db.query_rows(&sql).await.unwrap();
    assert_eq!(
        rows,
        vec![
            vec![
                Some("1.2".to_string()),
                Some("1".to_string()),
                Some("1700000000123".to_string()),
                None
            ],
            vec![
                Some("1.3".to_string()),
                Some("0".to_string()),
                Some("1700000001500".to_string()),
                Some("x".to_string())
            ],
        ]
    );
}

#[tokio::test]
async fn test_rollback_discards_work() {
    let Some(db) = connect("st_db_tx").await else {
        return;
    };
    db.begin().await.unwrap();
    db.execute("CREATE TABLE scratch (id INT)").await.unwrap();
    db.rollback().await.unwrap();
    assert!(!db.relation_exists("scratch").await.unwrap());
    assert!(!db.relation_exists("st_db_tx.scratch").await.unwrap());

    db.execute("CREATE TABLE kept (id INT)").await.unwrap();
    assert!(db.relation_exists("st_db_tx.kept").await.unwrap());
}

#[tokio::test]
async fn test_unique_violation_is_conflict() {
    let Some(db) = connect("st_db_conflict").await else {
        return;
    };
    db.execute_batch("CREATE TABLE u (id INT PRIMARY KEY); INSERT INTO u VALUES (1);")
        .await
        .unwrap();
    let err = db.execute("INSERT INTO u VALUES (1)").await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "got {err:?}");

    let err = db.execute("SELECT * FROM missing_table").await.unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)), "got {err:?}");
}
