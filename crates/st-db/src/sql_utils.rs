//! SQL quoting utilities
//!
//! History bookkeeping and the data helpers build statements from table,
//! column and literal values supplied at registration time. Everything that
//! ends up inside generated SQL passes through one of these functions.

/// Quote a SQL identifier.
///
/// Wraps the identifier in double quotes and escapes any embedded double quotes
/// by doubling them, following the SQL standard.
///
/// # Examples
/// ```
/// use st_db::sql_utils::quote_ident;
/// assert_eq!(quote_ident("widget"), r#""widget""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a potentially schema-qualified name (e.g. `schema.table`).
///
/// Splits on `.` and individually quotes each component.
///
/// # Examples
/// ```
/// use st_db::sql_utils::quote_qualified;
/// assert_eq!(quote_qualified("widget"), r#""widget""#);
/// assert_eq!(quote_qualified("config.actor"), r#""config"."actor""#);
/// ```
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a list of column names and join them with `, `.
pub fn quote_column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a potentially schema-qualified name into (schema, table).
///
/// Uses the last `.` as the separator. Unqualified names return `None` for
/// the schema so the caller can fall back to the session's current schema.
///
/// # Examples
/// ```
/// use st_db::sql_utils::split_qualified_name;
/// assert_eq!(split_qualified_name("widget"), (None, "widget"));
/// assert_eq!(split_qualified_name("config.actor"), (Some("config"), "actor"));
/// ```
pub fn split_qualified_name(name: &str) -> (Option<&str>, &str) {
    if let Some(pos) = name.rfind('.') {
        (Some(&name[..pos]), &name[pos + 1..])
    } else {
        (None, name)
    }
}

/// Escape a SQL string literal value by doubling single quotes.
///
/// This is for use inside single-quoted SQL string literals, not identifiers.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Render a complete single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_sql_string(value))
}

#[cfg(test)]
#[path = "sql_utils_test.rs"]
mod tests;
