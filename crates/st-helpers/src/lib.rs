//! st-helpers - Data-migration primitives for Stratum
//!
//! Idempotent building blocks that migration bodies call into instead of
//! hand-writing the same cleanup SQL in every unit: deduplicate-then-constrain,
//! conditional backfill, enum extension, and scoped override resolution.

pub mod backfill;
pub mod body;
pub mod dedupe;
pub mod enum_ext;
pub mod error;
pub mod scoped;

#[cfg(all(test, feature = "postgres"))]
mod pg_support;

pub use backfill::{backfill_where_null, Backfill};
pub use body::{BackfillBody, DedupeBody, EnumExtensionBody};
pub use dedupe::{dedupe_then_constrain, DedupeOutcome, DedupeSpec};
pub use enum_ext::{extend_enum, EnumExtension};
pub use error::{HelperError, HelperResult};
pub use scoped::{resolve_scoped_override, OverrideOutcome, OverrideRequest, Scope, ScopedOverrideTable};
