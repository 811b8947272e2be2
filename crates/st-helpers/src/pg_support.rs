//! Shared setup for tests that need a live Postgres.

use st_db::{MigrationConnection, PostgresBackend};

const URL_VAR: &str = "STRATUM_TEST_POSTGRES_URL";

/// Connect with `schema` reset and first on the search path, or `None` when
/// no test database is configured.
pub(crate) async fn connect(schema: &str) -> Option<PostgresBackend> {
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
