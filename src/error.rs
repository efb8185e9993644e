use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn invalid_backup(message: impl Into<String>) -> Self {
        AppError::InvalidBackup(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
