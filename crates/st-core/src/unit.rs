//! Migration units and their executable bodies.

use crate::checksum::{canonicalize_sql, compute_checksum};
use crate::statements::split_statements;
use crate::version::Version;
use async_trait::async_trait;
use futures::future::BoxFuture;
use st_db::{DbError, MigrationConnection};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised from inside a migration body
#[derive(Error, Debug)]
pub enum BodyError {
    /// A statement issued by the body failed
    #[error(transparent)]
    Db(#[from] DbError),

    /// The body found state inconsistent with its assumptions (B001)
    #[error("[B001] Unexpected pre-existing state: {0}")]
    PreexistingState(String),

    /// The body gave up for another reason (B002)
    #[error("[B002] {0}")]
    Failed(String),
}

/// Result type alias for BodyError
pub type BodyResult<T> = Result<T, BodyError>;

/// Future returned by closure bodies.
pub type BodyFuture<'a> = BoxFuture<'a, BodyResult<()>>;

/// The executable part of a migration unit.
///
/// `canonical_form` feeds the unit's checksum: two bodies that do the same
/// thing must produce the same text, and any change in behaviour must change
/// it.
#[async_trait]
pub trait MigrationBody: Send + Sync {
    /// Run the body against the session the engine hands in.
    async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()>;

    /// Deterministic text describing what `apply` does.
    fn canonical_form(&self) -> String;
}

/// A body made of plain SQL.
///
/// By default the script goes to the database in one call. A body built with
/// [`SqlBody::per_statement`] issues every top-level statement as its own
/// call, so each one autocommits.
pub struct SqlBody {
    sql: String,
    per_statement: bool,
}

impl SqlBody {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            per_statement: false,
        }
    }

    /// Body for non-transactional units.
    pub fn per_statement(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            per_statement: true,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_per_statement(&self) -> bool {
        self.per_statement
    }
}

#[async_trait]
impl MigrationBody for SqlBody {
    async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()> {
        // placeholder versions carry no statements
        if canonicalize_sql(&self.sql).is_empty() {
            return Ok(());
        }
        if !self.per_statement {
            conn.execute_batch(&self.sql).await?;
            return Ok(());
        }
        for statement in split_statements(&self.sql) {
            conn.execute_batch(statement).await?;
        }
        Ok(())
    }

    fn canonical_form(&self) -> String {
        canonicalize_sql(&self.sql)
    }
}

/// A body backed by an async closure.
///
/// The closure's code cannot be hashed, so the caller supplies a fingerprint
/// and is responsible for changing it whenever the closure's behaviour
/// changes.
pub struct FnBody<F> {
    fingerprint: String,
    f: F,
}

impl<F> FnBody<F>
where
    F: for<'a> Fn(&'a dyn MigrationConnection) -> BodyFuture<'a> + Send + Sync,
{
    pub fn new(fingerprint: impl Into<String>, f: F) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> MigrationBody for FnBody<F>
where
    F: for<'a> Fn(&'a dyn MigrationConnection) -> BodyFuture<'a> + Send + Sync,
{
    async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()> {
        (self.f)(conn).await
    }

    fn canonical_form(&self) -> String {
        self.fingerprint.clone()
    }
}

/// One versioned, checksummed, executable schema or data change.
///
/// Immutable once constructed; the checksum is computed here and never
/// recomputed.
#[derive(Clone)]
pub struct MigrationUnit {
    version: Version,
    description: String,
    checksum: String,
    transactional: bool,
    origin: String,
    body: Arc<dyn MigrationBody>,
}

impl MigrationUnit {
    /// Build a unit from any body.
    ///
    /// `transactional` is required: pass `false` for statements that cannot
    /// run inside a transaction block (concurrent index builds, enum
    /// additions).
    pub fn new(
        version: Version,
        description: impl Into<String>,
        transactional: bool,
        body: impl MigrationBody + 'static,
    ) -> Self {
        let checksum = compute_checksum(&body.canonical_form());
        Self {
            version,
            description: description.into(),
            checksum,
            transactional,
            origin: "code".to_string(),
            body: Arc::new(body),
        }
    }

    /// A transactional unit made of plain SQL.
    pub fn sql(version: Version, description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::from_sql(version, description, true, sql)
    }

    /// A non-transactional unit made of plain SQL.
    pub fn sql_non_transactional(
        version: Version,
        description: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self::from_sql(version, description, false, sql)
    }

    /// A SQL unit; non-transactional scripts run one statement per call.
    pub fn from_sql(
        version: Version,
        description: impl Into<String>,
        transactional: bool,
        sql: impl Into<String>,
    ) -> Self {
        let body = if transactional {
            SqlBody::new(sql)
        } else {
            SqlBody::per_statement(sql)
        };
        Self::new(version, description, transactional, body)
    }

    /// A unit whose body is an async closure identified by `fingerprint`.
    pub fn from_fn<F>(
        version: Version,
        description: impl Into<String>,
        transactional: bool,
        fingerprint: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a dyn MigrationConnection) -> BodyFuture<'a> + Send + Sync + 'static,
    {
        Self::new(version, description, transactional, FnBody::new(fingerprint, f))
    }

    /// Record where the unit came from (file path, embedded list), for error messages.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Execute the body. Transaction handling is the engine's job.
    pub async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()> {
        self.body.apply(conn).await
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("checksum", &self.checksum)
            .field("transactional", &self.transactional)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "unit_test.rs"]
mod tests;
