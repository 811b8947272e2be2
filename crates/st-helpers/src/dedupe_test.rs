use super::*;
use st_db::{DbError, DuckDbBackend};

async fn connections_table(db: &DuckDbBackend) {
    db.execute_batch(
        "CREATE TABLE connection (id INT, workspace_id INT, name TEXT, created_at TIMESTAMP);
         INSERT INTO connection VALUES
           (1, 10, 'prod', TIMESTAMP '2024-01-02 00:00:00'),
           (2, 10, 'prod', TIMESTAMP '2024-01-01 00:00:00'),
           (3, 10, 'prod', TIMESTAMP '2024-01-03 00:00:00'),
           (4, 10, 'dev',  TIMESTAMP '2024-01-01 00:00:00'),
           (5, 20, 'prod', TIMESTAMP '2024-01-01 00:00:00'),
           (6, NULL, 'orphan', TIMESTAMP '2024-01-01 00:00:00'),
           (7, NULL, 'orphan', TIMESTAMP '2024-01-02 00:00:00');",
    )
    .await
    .unwrap();
}

fn spec() -> DedupeSpec {
    DedupeSpec::new(
        "connection",
        &["workspace_id", "name"],
        "created_at",
        "connection_workspace_name_uk",
    )
}

#[tokio::test]
async fn test_earliest_row_survives() {
    let db = DuckDbBackend::in_memory().unwrap();
    connections_table(&db).await;

    let outcome = dedupe_then_constrain(&db, &spec()).await.unwrap();
    assert_eq!(outcome.deleted, 2);

    let rows = db
        .query_rows("SELECT id FROM connection WHERE workspace_id = 10 AND name = 'prod'")
        .await
        .unwrap();
    assert_eq!(rows, vec![vec![Some("2".to_string())]]);
}

#[tokio::test]
async fn test_null_keys_untouched() {
    let db = DuckDbBackend::in_memory().unwrap();
    connections_table(&db).await;

    dedupe_then_constrain(&db, &spec()).await.unwrap();
    let orphans = db
        .query_scalar_i64("SELECT COUNT(*) FROM connection WHERE workspace_id IS NULL")
        .await
        .unwrap();
    assert_eq!(orphans, 2);
}

#[tokio::test]
async fn test_constraint_enforced_afterwards() {
    let db = DuckDbBackend::in_memory().unwrap();
    connections_table(&db).await;

    dedupe_then_constrain(&db, &spec()).await.unwrap();
    let err = db
        .execute("INSERT INTO connection VALUES (8, 10, 'prod', now())")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "got {err}");
}

#[tokio::test]
async fn test_ties_resolved_by_row_id() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE tag (id INT, label TEXT, created_at INT);
         INSERT INTO tag VALUES (1, 'a', 5), (2, 'a', 5), (3, 'a', 5);",
    )
    .await
    .unwrap();

    let outcome = dedupe_then_constrain(
        &db,
        &DedupeSpec::new("tag", &["label"], "created_at", "tag_label_uk"),
    )
    .await
    .unwrap();
    assert_eq!(outcome.deleted, 2);
    assert_eq!(
        db.query_scalar_i64("SELECT id FROM tag").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_clean_table_deletes_nothing() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (k INT, ts INT); INSERT INTO t VALUES (1, 1), (2, 1);")
        .await
        .unwrap();
    let outcome = dedupe_then_constrain(&db, &DedupeSpec::new("t", &["k"], "ts", "t_k_uk"))
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 0);
}

#[tokio::test]
async fn test_empty_key_rejected() {
    let db = DuckDbBackend::in_memory().unwrap();
    let err = dedupe_then_constrain(&db, &DedupeSpec::new("t", &[], "ts", "uk"))
        .await
        .unwrap_err();
    assert!(matches!(err, HelperError::InvalidSpec(_)));
}

#[cfg(feature = "postgres")]
#[tokio::test]
async fn test_postgres_dedupe_uses_ctid_and_adds_constraint() {
    let Some(db) = crate::pg_support::connect("st_helpers_dedupe").await else {
        return;
    };
    db.execute_batch(
        "CREATE TABLE connection (id INT, workspace_id INT, name TEXT, created_at TIMESTAMP);
         INSERT INTO connection VALUES
           (1, 10, 'prod', TIMESTAMP '2024-01-02 00:00:00'),
           (2, 10, 'prod', TIMESTAMP '2024-01-01 00:00:00'),
           (3, 10, 'prod', TIMESTAMP '2024-01-01 00:00:00'),
           (4, NULL, 'orphan', TIMESTAMP '2024-01-01 00:00:00'),
           (5, NULL, 'orphan', TIMESTAMP '2024-01-02 00:00:00');",
    )
    .await
    .unwrap();

    let outcome = dedupe_then_constrain(&db, &spec()).await.unwrap();
    assert_eq!(outcome.deleted, 2);
    assert_eq!(
        db.query_scalar_i64("SELECT COUNT(*) FROM connection WHERE workspace_id IS NULL")
            .await
            .unwrap(),
        2
    );
    let constraints = db
        .query_scalar_i64(
            "SELECT COUNT(*) FROM pg_constraint WHERE conname = 'connection_workspace_name_uk' AND contype = 'u'",
        )
        .await
        .unwrap();
    assert_eq!(constraints, 1);

    let err = db
        .execute("INSERT INTO connection VALUES (9, 10, 'prod', now())")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "got {err:?}");
}
