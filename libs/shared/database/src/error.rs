use shared_models::error::AppError;
use thiserror::Error;

/// Faults raised by a record store, independent of the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record: {0}")]
    Decode(String),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation(_))
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(msg) => AppError::conflict("DUPLICATE", msg),
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::Rejected { .. } | DbError::Unavailable(_) => AppError::Database(err.to_string()),
            DbError::Decode(msg) => AppError::Internal(msg),
        }
    }
}
