use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Book not found: {0}")]
    NotFound(String),

    /// Book is on the denylist and may not be downloaded.
    #[error("This book is denied for download: {0}")]
    Forbidden(String),

    /// Another record already references the same stored file.
    #[error("A book is already stored at {0}")]
    DuplicateFileReference(String),

    /// Invalid format error (unreadable workbook, wrong upload type).
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Malformed request field, such as a publication date.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The catalog references a file that is gone from the upload directory.
    #[error("Book file not found on server: {0}")]
    FileMissing(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Database error, tagged with the failing operation.
    #[error("Database error ({op}): {source}")]
    Database {
        /// Store operation that failed.
        op: &'static str,
        /// Underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap a SQLite error with the name of the store operation.
    pub fn db(op: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| AppError::Database { op, source }
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::DuplicateFileReference(_) => StatusCode::CONFLICT,
            AppError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, self.to_string()).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
