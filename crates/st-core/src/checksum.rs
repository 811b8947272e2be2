//! SHA-256 checksums over canonicalised migration bodies.
//!
//! SQL is parsed and re-rendered before hashing, so whitespace, comments and
//! keyword case never register as drift while statement order and content do.

use sha2::{Digest, Sha256};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Compute SHA256 checksum of a string
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Produce the canonical form of a SQL migration body.
///
/// Statements that `sqlparser` understands are re-rendered from the AST and
/// joined with `;\n`. Anything it cannot parse (vendor-specific DDL, for
/// instance) falls back to [`normalize_sql_text`].
pub fn canonicalize_sql(sql: &str) -> String {
    if sql.trim().is_empty() {
        return String::new();
    }
    match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(statements) => statements
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";\n"),
        Err(e) => {
            log::debug!("Checksumming unparsed SQL text ({e})");
            normalize_sql_text(sql)
        }
    }
}

/// Strip comments and collapse whitespace outside of quoted text.
///
/// Single-quoted literals and double-quoted identifiers are copied verbatim.
pub fn normalize_sql_text(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == c {
                        // doubled quote is an escape, keep scanning
                        if chars.peek() == Some(&c) {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                pending_space = true;
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }

    out.trim_end_matches([';', ' ']).to_string()
}

#[cfg(test)]
#[path = "checksum_test.rs"]
mod tests;
