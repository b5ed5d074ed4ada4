use thiserror::Error;

use crate::{LedgerError, QueueError};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
}

impl From<SqliteDatabaseError> for LedgerError {
    fn from(e: SqliteDatabaseError) -> Self {
        Self::StorageFailure(e.to_string())
    }
}

impl From<SqliteDatabaseError> for QueueError {
    fn from(e: SqliteDatabaseError) -> Self {
        Self::StorageFailure(e.to_string())
    }
}
