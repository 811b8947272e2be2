use super::*;
use st_db::DuckDbBackend;

async fn actors(db: &DuckDbBackend) {
    db.execute_batch(
        "CREATE TABLE actor (id INT, kind TEXT, tombstone BOOLEAN, actor_type TEXT);
         INSERT INTO actor VALUES
           (1, 'src', false, NULL),
           (2, 'dst', false, NULL),
           (3, 'src', true, NULL),
           (4, 'dst', false, 'custom');",
    )
    .await
    .unwrap();
}

#[test]
fn test_to_sql() {
    let sql = Backfill::new("public.actor", "actor_type", "upper(kind)")
        .with_predicate("tombstone = false")
        .to_sql();
    assert_eq!(
        sql,
        r#"UPDATE "public"."actor" SET "actor_type" = (upper(kind)) WHERE "actor_type" IS NULL AND (tombstone = false)"#
    );
}

#[tokio::test]
async fn test_only_null_rows_written() {
    let db = DuckDbBackend::in_memory().unwrap();
    actors(&db).await;

    let updated = backfill_where_null(&db, &Backfill::new("actor", "actor_type", "upper(kind)"))
        .await
        .unwrap();
    assert_eq!(updated, 3);

    let rows = db
        .query_rows("SELECT actor_type FROM actor ORDER BY id")
        .await
        .unwrap();
    let values: Vec<_> = rows.into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(
        values,
        vec![
            Some("SRC".to_string()),
            Some("DST".to_string()),
            Some("SRC".to_string()),
            Some("custom".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_rerun_is_noop() {
    let db = DuckDbBackend::in_memory().unwrap();
    actors(&db).await;
    let backfill = Backfill::new("actor", "actor_type", "upper(kind)");
    backfill_where_null(&db, &backfill).await.unwrap();
    assert_eq!(backfill_where_null(&db, &backfill).await.unwrap(), 0);
}

#[tokio::test]
async fn test_predicate_limits_rows() {
    let db = DuckDbBackend::in_memory().unwrap();
    actors(&db).await;
    let updated = backfill_where_null(
        &db,
        &Backfill::new("actor", "actor_type", "kind").with_predicate("tombstone = false"),
    )
    .await
    .unwrap();
    assert_eq!(updated, 2);
}

#[tokio::test]
async fn test_empty_expression_rejected() {
    let db = DuckDbBackend::in_memory().unwrap();
    let err = backfill_where_null(&db, &Backfill::new("actor", "actor_type", " "))
        .await
        .unwrap_err();
    assert!(matches!(err, HelperError::InvalidSpec(_)));
}
