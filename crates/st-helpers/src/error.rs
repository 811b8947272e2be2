//! Error types for st-helpers

use st_core::BodyError;
use st_db::DbError;
use thiserror::Error;

/// Helper errors
#[derive(Error, Debug)]
pub enum HelperError {
    /// A statement issued by the helper failed
    #[error(transparent)]
    Db(#[from] DbError),

    /// The helper was called with an unusable argument (H001)
    #[error("[H001] Invalid helper arguments: {0}")]
    InvalidSpec(String),

    /// The data contradicts what the helper was asked to guarantee (H002)
    #[error("[H002] Unexpected pre-existing state: {0}")]
    PreexistingState(String),
}

/// Result type alias for HelperError
pub type HelperResult<T> = Result<T, HelperError>;

impl From<HelperError> for BodyError {
    fn from(err: HelperError) -> Self {
        match err {
            HelperError::Db(e) => BodyError::Db(e),
            HelperError::PreexistingState(msg) => BodyError::PreexistingState(msg),
            other => BodyError::Failed(other.to_string()),
        }
    }
}
