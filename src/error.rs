use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A pool construction error.
    #[error("Pool setup error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A row was missing an expected column.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A session token that is malformed, carries a bad signature, or has
    /// expired. The three cases are deliberately indistinguishable outside.
    #[error("Invalid session token")]
    InvalidToken,

    /// A well-formed token superseded by a newer session. Must look exactly
    /// like `InvalidToken` to the client.
    #[error("Revoked session token")]
    Revoked,

    /// The signing secret is missing. Token operations refuse to run rather
    /// than fall back to a weak key.
    #[error("Signing secret not configured")]
    NotConfigured,

    /// The caller has no valid verification pass.
    #[error("Verification required")]
    VerificationRequired,

    /// A rate limit exceeded error, carrying the seconds until the window
    /// resets.
    #[error("Rate limit exceeded, retry in {retry_after}s")]
    RateLimited { retry_after: i64 },

    /// A request rejected by the origin trust guard.
    #[error("Forbidden")]
    Forbidden,

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A password hashing error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string(), None)
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string(), None)
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Pool setup error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string(), None)
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing data in row: {}", column);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }

            AppError::InvalidToken => {
                tracing::warn!("Invalid session token presented");
                (StatusCode::UNAUTHORIZED, "Invalid or expired session".to_string(), None)
            }

            AppError::Revoked => {
                // Same status and body as InvalidToken: the response must not
                // reveal that the token was once valid.
                tracing::warn!("Superseded session token presented");
                (StatusCode::UNAUTHORIZED, "Invalid or expired session".to_string(), None)
            }

            AppError::NotConfigured => {
                tracing::error!("Session signing secret is not configured");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }

            AppError::VerificationRequired => {
                tracing::debug!("Request without a valid verification pass");
                (StatusCode::FORBIDDEN, "Verification required".to_string(), None)
            }

            AppError::RateLimited { retry_after } => {
                tracing::warn!("Rate limit exceeded, retry in {}s", retry_after);
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string(), Some(retry_after))
            }

            AppError::Forbidden => {
                tracing::warn!("Request blocked by origin trust guard");
                (StatusCode::FORBIDDEN, "Forbidden".to_string(), None)
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone(), None)
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string(), None)
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.max(0).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
