//! Migration bodies built from the helpers.
//!
//! Each wrapper's canonical form spells out every argument, so changing the
//! table, columns or expression of an applied unit shows up as drift.

use crate::backfill::{backfill_where_null, Backfill};
use crate::dedupe::{dedupe_then_constrain, DedupeSpec};
use crate::enum_ext::extend_enum;
use async_trait::async_trait;
use st_core::{BodyResult, MigrationBody, MigrationUnit, Version};
use st_db::MigrationConnection;

/// Deduplicate-then-constrain as a transactional unit.
pub struct DedupeBody {
    spec: DedupeSpec,
}

impl DedupeBody {
    pub fn new(spec: DedupeSpec) -> Self {
        Self { spec }
    }

    pub fn into_unit(self, version: Version, description: impl Into<String>) -> MigrationUnit {
        MigrationUnit::new(version, description, true, self)
    }
}

#[async_trait]
impl MigrationBody for DedupeBody {
    async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()> {
        let outcome = dedupe_then_constrain(conn, &self.spec).await?;
        log::info!(
            "Deduplicated {}: {} row(s) removed, {} added",
            self.spec.table,
            outcome.deleted,
            self.spec.constraint_name
        );
        Ok(())
    }

    fn canonical_form(&self) -> String {
        format!(
            "dedupe_then_constrain table={} key=({}) tiebreak={} constraint={}",
            self.spec.table,
            self.spec.key_columns.join(","),
            self.spec.tiebreak,
            self.spec.constraint_name
        )
    }
}

/// Conditional backfill as a transactional unit.
pub struct BackfillBody {
    backfill: Backfill,
}

impl BackfillBody {
    pub fn new(backfill: Backfill) -> Self {
        Self { backfill }
    }

    pub fn into_unit(self, version: Version, description: impl Into<String>) -> MigrationUnit {
        MigrationUnit::new(version, description, true, self)
    }
}

#[async_trait]
impl MigrationBody for BackfillBody {
    async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()> {
        let updated = backfill_where_null(conn, &self.backfill).await?;
        log::info!(
            "Backfilled {} row(s) of {}.{}",
            updated,
            self.backfill.table,
            self.backfill.column
        );
        Ok(())
    }

    fn canonical_form(&self) -> String {
        self.backfill.to_sql()
    }
}

/// Enum extension; always a non-transactional unit.
pub struct EnumExtensionBody {
    type_name: String,
    literal: String,
}

impl EnumExtensionBody {
    pub fn new(type_name: impl Into<String>, literal: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            literal: literal.into(),
        }
    }

    pub fn into_unit(self, version: Version, description: impl Into<String>) -> MigrationUnit {
        MigrationUnit::new(version, description, false, self)
    }
}

#[async_trait]
impl MigrationBody for EnumExtensionBody {
    async fn apply(&self, conn: &dyn MigrationConnection) -> BodyResult<()> {
        extend_enum(conn, &self.type_name, &self.literal).await?;
        Ok(())
    }

    fn canonical_form(&self) -> String {
        format!("extend_enum type={} literal={}", self.type_name, self.literal)
    }
}

#[cfg(test)]
#[path = "body_test.rs"]
mod tests;
