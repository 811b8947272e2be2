//! Scoped override resolution.
//!
//! Configuration overrides live in one table keyed by
//! `(config key, resource, scope type)`. A value set at a more specific scope
//! wins over one set higher up, so before pinning a value at some scope the
//! helper checks whether that scope, or a narrower one, already decides it.

use crate::error::{HelperError, HelperResult};
use st_db::sql_utils::{quote_ident, quote_literal, quote_qualified};
use st_db::MigrationConnection;
use std::fmt;
use std::str::FromStr;

/// Override scopes, ordered from broadest to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Global,
    Organization,
    Workspace,
    Resource,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Organization => "organization",
            Scope::Workspace => "workspace",
            Scope::Resource => "resource",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = HelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(Scope::Global),
            "organization" => Ok(Scope::Organization),
            "workspace" => Ok(Scope::Workspace),
            "resource" | "actor" => Ok(Scope::Resource),
            other => Err(HelperError::InvalidSpec(format!("unknown scope '{other}'"))),
        }
    }
}

/// Layout of the override table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedOverrideTable {
    pub table: String,
    pub key_column: String,
    pub resource_column: String,
    pub scope_column: String,
    pub scope_id_column: String,
    pub value_column: String,
}

impl ScopedOverrideTable {
    /// Table with the conventional column names
    /// `config_key, resource_id, scope_type, scope_id, value`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: "config_key".to_string(),
            resource_column: "resource_id".to_string(),
            scope_column: "scope_type".to_string(),
            scope_id_column: "scope_id".to_string(),
            value_column: "value".to_string(),
        }
    }
}

/// An override to write unless something at least as specific exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRequest {
    pub key: String,
    pub resource_id: String,
    pub scope: Scope,
    pub scope_id: String,
    pub value: String,
}

/// What [`resolve_scoped_override`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// A new row was written
    Inserted,
    /// The same `(key, resource, scope)` already has a row
    AlreadyPresent,
    /// A narrower scope already overrides the value; nothing written
    Shadowed(Scope),
}

/// Write the override unless it would duplicate or be shadowed by an
/// existing one.
pub async fn resolve_scoped_override(
    conn: &dyn MigrationConnection,
    layout: &ScopedOverrideTable,
    request: &OverrideRequest,
) -> HelperResult<OverrideOutcome> {
    let table = quote_qualified(&layout.table);
    let rows = conn
        .query_rows(&format!(
            "SELECT {} FROM {} WHERE {} = {} AND {} = {}",
            quote_ident(&layout.scope_column),
            table,
            quote_ident(&layout.key_column),
            quote_literal(&request.key),
            quote_ident(&layout.resource_column),
            quote_literal(&request.resource_id),
        ))
        .await?;

    let mut existing = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(Some(raw)) = row.into_iter().next() {
            existing.push(raw.parse::<Scope>()?);
        }
    }

    if existing.contains(&request.scope) {
        return Ok(OverrideOutcome::AlreadyPresent);
    }
    if let Some(narrower) = existing.into_iter().filter(|s| *s > request.scope).max() {
        log::debug!(
            "Override {} for {} is already set at {} scope",
            request.key,
            request.resource_id,
            narrower
        );
        return Ok(OverrideOutcome::Shadowed(narrower));
    }

    conn.execute(&format!(
        "INSERT INTO {} ({}, {}, {}, {}, {}) VALUES ({}, {}, {}, {}, {})",
        table,
        quote_ident(&layout.key_column),
        quote_ident(&layout.resource_column),
        quote_ident(&layout.scope_column),
        quote_ident(&layout.scope_id_column),
        quote_ident(&layout.value_column),
        quote_literal(&request.key),
        quote_literal(&request.resource_id),
        quote_literal(request.scope.as_str()),
        quote_literal(&request.scope_id),
        quote_literal(&request.value),
    ))
    .await?;
    Ok(OverrideOutcome::Inserted)
}

#[cfg(test)]
#[path = "scoped_test.rs"]
mod tests;
