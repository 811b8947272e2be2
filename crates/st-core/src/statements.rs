//! Splitting SQL scripts into top-level statements.
//!
//! Non-transactional units must send each statement on its own: Postgres runs
//! a multi-statement simple query as one implicit transaction, which
//! `CREATE INDEX CONCURRENTLY` and freshly added enum values both reject.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer};

use crate::checksum::normalize_sql_text;

/// Split `sql` at top-level semicolons, keeping each statement's original text.
///
/// Semicolons inside string literals, quoted identifiers, dollar-quoted
/// bodies and comments do not split. Pieces holding only whitespace or
/// comments are dropped. If the script cannot be tokenized it comes back as a
/// single statement.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let tokens = match Tokenizer::new(&GenericDialect {}, sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            log::debug!("Running unsplit SQL script ({e})");
            return non_empty(sql).into_iter().collect();
        }
    };

    let line_starts = line_starts(sql);
    let mut statements = Vec::new();
    let mut start = 0;
    for token in tokens.iter().filter(|t| t.token == Token::SemiColon) {
        let Some(end) = byte_offset(sql, &line_starts, token.span.start) else {
            continue;
        };
        statements.extend(non_empty(&sql[start..end]));
        start = end + 1;
    }
    statements.extend(non_empty(&sql[start..]));
    statements
}

fn non_empty(piece: &str) -> Option<&str> {
    if normalize_sql_text(piece).is_empty() {
        None
    } else {
        Some(piece.trim())
    }
}

fn line_starts(sql: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Tokenizer locations are 1-based line and character columns.
fn byte_offset(sql: &str, line_starts: &[usize], loc: Location) -> Option<usize> {
    let line_start = *line_starts.get((loc.line as usize).checked_sub(1)?)?;
    let column = (loc.column as usize).checked_sub(1)?;
    sql[line_start..]
        .char_indices()
        .nth(column)
        .map(|(i, _)| line_start + i)
}

#[cfg(test)]
#[path = "statements_test.rs"]
mod tests;
