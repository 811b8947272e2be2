use super::*;
use st_db::DuckDbBackend;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn unit(version: &str) -> MigrationUnit {
    MigrationUnit::sql(v(version), format!("unit {version}"), "SELECT 1")
}

#[tokio::test]
async fn test_ensure_initialized_is_idempotent() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("stratum_schema_history");
    assert!(!store.exists(&db).await.unwrap());

    store.ensure_initialized(&db).await.unwrap();
    store.ensure_initialized(&db).await.unwrap();
    assert!(store.exists(&db).await.unwrap());
    assert_eq!(store.count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_table_layout() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("stratum_schema_history");
    store.ensure_initialized(&db).await.unwrap();

    let rows = db
        .query_rows(
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_name = 'stratum_schema_history' ORDER BY ordinal_position",
        )
        .await
        .unwrap();
    let columns: Vec<(String, String, String)> = rows
        .into_iter()
        .map(|r| {
            (
                r[0].clone().unwrap(),
                r[1].clone().unwrap(),
                r[2].clone().unwrap(),
            )
        })
        .collect();
    let names: Vec<&str> = columns.iter().map(|c| c.0.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "version",
            "description",
            "checksum",
            "success",
            "applied_at",
            "execution_time_ms"
        ]
    );
    assert_eq!(columns[3].1, "BOOLEAN");
    assert_eq!(columns[4].1, "TIMESTAMP WITH TIME ZONE");
    assert_eq!(columns[5].1, "BIGINT");
    assert!(columns[1..].iter().all(|c| c.2 == "NO"));
}

#[tokio::test]
async fn test_schema_qualified_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("ops.schema_history");
    store.ensure_initialized(&db).await.unwrap();
    assert!(store.exists(&db).await.unwrap());
}

#[tokio::test]
async fn test_record_and_load_in_version_order() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("stratum_schema_history");
    store.ensure_initialized(&db).await.unwrap();

    for version in ["0.10", "0.9", "0.9.1"] {
        store
            .record_attempt(&db, &unit(version), true, 12, "run-1")
            .await
            .unwrap();
    }
    let written = store
        .record_attempt(&db, &unit("1"), false, 5, "run-1")
        .await
        .unwrap();

    let records = store.load_applied(&db).await.unwrap();
    let versions: Vec<String> = records.iter().map(|r| r.version.to_string()).collect();
    assert_eq!(versions, vec!["0.9", "0.9.1", "0.10", "1"]);

    let last = records.last().unwrap();
    assert!(!last.success);
    assert_eq!(last.checksum, unit("1").checksum());
    assert_eq!(last.execution_time_ms, 5);
    assert_eq!(last.applied_by, None);
    assert!((last.applied_at - written.applied_at).num_seconds().abs() <= 1);
}

#[tokio::test]
async fn test_duplicate_version_row_conflicts() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("stratum_schema_history");
    store.ensure_initialized(&db).await.unwrap();
    store
        .record_attempt(&db, &unit("1"), true, 1, "run-1")
        .await
        .unwrap();
    assert!(store
        .record_attempt(&db, &unit("1"), true, 1, "run-2")
        .await
        .is_err());
}

#[tokio::test]
async fn test_mark_repaired() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("stratum_schema_history");
    store.ensure_initialized(&db).await.unwrap();
    store
        .record_attempt(&db, &unit("5"), false, 3, "run-1")
        .await
        .unwrap();

    let fixed = MigrationUnit::sql(v("5"), "fixed body", "SELECT 2");
    assert!(store.mark_repaired(&db, &v("5"), Some(&fixed)).await.unwrap());
    // only failed rows are eligible
    assert!(!store.mark_repaired(&db, &v("5"), Some(&fixed)).await.unwrap());
    assert!(!store.mark_repaired(&db, &v("6"), None).await.unwrap());

    let record = &store.load_applied(&db).await.unwrap()[0];
    assert!(record.success);
    assert_eq!(record.checksum, fixed.checksum());
    assert_eq!(record.description, "fixed body");
}

#[tokio::test]
async fn test_insert_baseline() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = HistoryStore::new("stratum_schema_history");
    store.ensure_initialized(&db).await.unwrap();
    store
        .insert_baseline(&db, &v("0.40"), "<< baseline >>", "run-1")
        .await
        .unwrap();

    let records = store.load_applied(&db).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_baseline());
    assert!(records[0].success);
}
