use domain::OrderError;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The order violates its invariants and was not written.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    /// The store could not be reached.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into the domain model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
