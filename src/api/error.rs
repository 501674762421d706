use thiserror::Error;

use crate::auth::credentials::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 on a request that was already replayed once; terminal for the call.
    #[error("Unauthorized - access token rejected")]
    Unauthorized,

    /// Renewal itself failed; the stored credentials have been purged.
    #[error("Session expired - sign in again")]
    SessionExpired,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Not implemented by this endpoint: {0}")]
    NotImplemented(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            405 => ApiError::MethodNotAllowed(truncated),
            501 => ApiError::NotImplemented(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Classify a transport failure, separating timeouts from other network
    /// errors.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e)
        }
    }

    /// True for the statuses a tenant-scoped endpoint answers when the
    /// resource only exists at the system level (404, 405, 501).
    pub fn is_unimplemented(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound(_) | ApiError::MethodNotAllowed(_) | ApiError::NotImplemented(_)
        )
    }
}
