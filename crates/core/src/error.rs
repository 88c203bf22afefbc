#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Precondition(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("avenant cannot move from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BillingError {
    /// Translate a duplicate-key failure into a `Conflict` so callers can
    /// distinguish it from infrastructure faults. Everything else stays a
    /// `Database` error.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return BillingError::Conflict(db_err.message().to_string());
            }
        }
        BillingError::Database(err)
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;
