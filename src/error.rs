use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {field}: '{value}' is not a date (expected YYYY-MM-DD or RFC 3339)")]
    InvalidDate { field: &'static str, value: String },
}

impl AnalyticsError {
    /// Caller mistakes, as opposed to store or runtime failures.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalyticsError::InvalidDate { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
