use thiserror::Error;

use crate::traits::StoreError;

/// Errors from setting up and maintaining the SQLite backend itself, as opposed to the query errors reported through
/// [`StoreError`].
#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not apply database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl From<SqliteDatabaseError> for StoreError {
    fn from(e: SqliteDatabaseError) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
