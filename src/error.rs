use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::auth::token::TokenError;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error body returned for every failed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error_code: u16,
    pub description: String,
}

impl AppError {
    /// Client-facing description. Internal failures never leak their detail.
    pub fn description(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(msg) | AppError::Conflict(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            AppError::DatabaseError(DatabaseError::NotFound) => "Record not found".to_string(),
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(msg) => AppError::InternalError(msg),
            other => AppError::AuthError(AuthError::AccessDenied(other.to_string())),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(ApiErrorResponse {
            error_code: status.as_u16(),
            description: self.description(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::AccessDenied(_) => StatusCode::FORBIDDEN,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown account and wrong password collapse into this one variant.
    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,

    #[error("Full authentication is required to access this resource")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::NotFound)));

        let app_err: AppError = TokenError::Expired.into();
        assert!(matches!(app_err, AppError::AuthError(AuthError::AccessDenied(_))));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::Unauthorized);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::AccessDenied("token has expired".into()));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::ValidationError("invalid input".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::Conflict("duplicate".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::DatabaseError(DatabaseError::QueryError("boom".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_description() {
        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.description(), "Invalid username or password");

        let err = AppError::AuthError(AuthError::AccessDenied("token has expired".into()));
        assert_eq!(err.description(), "Access denied: token has expired");

        let err = AppError::InternalError("connection string leaked".into());
        assert_eq!(err.description(), "Internal server error");

        let err = AppError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");
    }

    #[actix_web::test]
    async fn test_error_body_shape() {
        let err = AppError::AuthError(AuthError::InvalidCredentials);
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errorCode"], 401);
        assert_eq!(json["description"], "Invalid username or password");
    }
}
