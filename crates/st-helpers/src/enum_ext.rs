//! Enum extension.

use crate::error::HelperResult;
use st_db::{DbError, MigrationConnection};

/// What [`extend_enum`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumExtension {
    Added,
    AlreadyPresent,
}

/// Append `literal` to enum type `type_name` unless it is already there.
///
/// Must run outside a transaction block; the new literal is not usable by
/// later statements until the surrounding session commits.
pub async fn extend_enum(
    conn: &dyn MigrationConnection,
    type_name: &str,
    literal: &str,
) -> HelperResult<EnumExtension> {
    let dialect = conn.dialect();
    let (Some(count_sql), Some(add_sql)) = (
        dialect.enum_literal_count(type_name, literal),
        dialect.add_enum_value(type_name, literal),
    ) else {
        return Err(DbError::NotImplemented {
            backend: dialect.name().to_string(),
            feature: "enum type extension".to_string(),
        }
        .into());
    };

    if conn.query_scalar_i64(&count_sql).await? > 0 {
        log::debug!("Enum {} already has value '{}'", type_name, literal);
        return Ok(EnumExtension::AlreadyPresent);
    }

    conn.execute(&add_sql).await?;
    log::info!("Added value '{}' to enum {}", literal, type_name);
    Ok(EnumExtension::Added)
}

#[cfg(test)]
#[path = "enum_ext_test.rs"]
mod tests;
