//! Error handling for the REST API
//!
//! Provides the `AppError` type used across all REST endpoints and helper
//! functions.

use crate::api::AppState;
use crate::auth;
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                // Log full details server-side, return a generic message
                tracing::error!(details = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        // The wire contract carries errors under a `message` key.
        let body = serde_json::json!({ "message": message });
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {}", err);
        AppError::Internal("An internal error occurred".to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Never leak database schema/query information to clients
        tracing::error!("Database error: {}", err);
        AppError::Internal("An internal error occurred".to_string())
    }
}

impl From<crate::storage::StoreError> for AppError {
    fn from(err: crate::storage::StoreError) -> Self {
        tracing::error!("Storage error: {}", err);
        AppError::Internal("An internal error occurred".to_string())
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Extract the authenticated user ID from the Authorization header
pub fn extract_user_id(state: &AppState, headers: &axum::http::HeaderMap) -> Result<Uuid, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".into()))?;

    let user_id = auth::verify_token(&state.config.jwt_secret, token)
        .map_err(|_| AppError::Unauthorized("Session expired or unauthorized".into()))?;
    Ok(user_id)
}

// ============================================================================
// FILENAME VALIDATION
// ============================================================================

/// Validate and normalize an uploaded file name.
///
/// Strips any client-supplied directory components and rejects names that
/// could not safely round-trip through a Content-Disposition header.
pub fn sanitize_filename(name: &str) -> Result<String, AppError> {
    if name.contains('\0') {
        return Err(AppError::BadRequest("File name contains invalid null byte".into()));
    }

    // Keep only the final path component, whichever separator the client used
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    if base.is_empty() || base == "." || base == ".." {
        return Err(AppError::BadRequest("File name cannot be empty".into()));
    }

    if base.chars().any(|c| c.is_control()) {
        return Err(AppError::BadRequest(
            "File name contains invalid control characters".into(),
        ));
    }

    if base.len() > 255 {
        return Err(AppError::BadRequest("File name is too long".into()));
    }

    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass() {
        assert_eq!(sanitize_filename("notes.txt").unwrap(), "notes.txt");
        assert_eq!(sanitize_filename("a b c.pdf").unwrap(), "a b c.pdf");
    }

    #[test]
    fn test_path_components_are_stripped() {
        assert_eq!(sanitize_filename("/etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini").unwrap(), "boot.ini");
        assert_eq!(sanitize_filename("dir/sub/report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn test_rejects_empty_and_dot_names() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("dir/").is_err());
    }

    #[test]
    fn test_rejects_null_bytes_and_controls() {
        assert!(sanitize_filename("foo\0bar").is_err());
        assert!(sanitize_filename("foo\nbar").is_err());
    }

    #[test]
    fn test_rejects_overlong_names() {
        let long = "a".repeat(300);
        assert!(sanitize_filename(&long).is_err());
    }
}
