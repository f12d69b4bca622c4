use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Subject '{0}' already has a pending interaction")]
    PendingExists(String),

    #[error("Corrupt record in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },
}
