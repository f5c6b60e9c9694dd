use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("edit window expired (created_at: {created_at}, max_edit_minutes: {max_edit_minutes})")]
    EditWindowExpired {
        created_at: chrono::DateTime<chrono::Utc>,
        max_edit_minutes: i64,
    },

    #[error("sender mismatch")]
    SenderMismatch,
}

impl AppError {
    /// Returns whether this error is retryable (e.g., transient storage trouble)
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }

    /// Returns HTTP status code for the transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Forbidden | AppError::SenderMismatch => 403,
            AppError::EditWindowExpired { .. } => 403,
            AppError::NotFound => 404,
            AppError::Config(_) | AppError::Storage(_) => 500,
        }
    }
}
