//! Migration version identifiers
//!
//! A version is an ordered tuple of non-negative integers written as a
//! dotted or underscored string, optionally prefixed with `V`:
//! `V0_50_24_008`, `V0.50.24.8` and `0.50.24.8` all name the same version.

use crate::error::{MigrateError, MigrateResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A parsed migration version.
///
/// Trailing zero segments are dropped at construction, so `1.0` and `1`
/// compare (and hash) equal. Ordering is segment-wise numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Parse a version string.
    pub fn parse(input: &str) -> MigrateResult<Self> {
        let malformed = |reason: &str| MigrateError::MalformedVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix('V')
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);
        if body.is_empty() {
            return Err(malformed("version is empty"));
        }

        let mut segments = Vec::new();
        for part in body.split(['.', '_']) {
            if part.is_empty() {
                return Err(malformed("empty version segment"));
            }
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed("version segments must be unsigned integers"));
            }
            let value = part
                .parse::<u64>()
                .map_err(|_| malformed("version segment out of range"))?;
            segments.push(value);
        }
        Ok(Self::from_segments(segments))
    }

    /// Build a version from its numeric segments.
    pub fn from_segments(mut segments: Vec<u64>) -> Self {
        while segments.len() > 1 && segments.last() == Some(&0) {
            segments.pop();
        }
        if segments.is_empty() {
            segments.push(0);
        }
        Self { segments }
    }

    /// The numeric segments, trailing zeros removed.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{text}")
    }
}

impl FromStr for Version {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
#[path = "version_test.rs"]
mod tests;
