use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Provider-side failure. `retryable` drives the retry wrapper:
    /// timeouts and 5xx can be retried, 4xx and malformed responses cannot.
    #[error("{provider} gateway error: {message}")]
    Gateway {
        provider: &'static str,
        http_status: Option<u16>,
        message: String,
        retryable: bool,
    },

    /// A write would violate the ledger's at-most-once or balance-derivation
    /// rules. Never swallowed: logged at error level and surfaced as 500.
    #[error("Ledger invariant violated: {0}")]
    LedgerInvariant(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the retry wrapper may re-attempt the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Gateway { retryable: true, .. })
    }

    /// Build a Gateway error from a transport-level reqwest failure.
    /// Timeouts and connection errors are retryable; everything else
    /// (TLS, decode, redirect policy) is terminal.
    pub fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        AppError::Gateway {
            provider,
            http_status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            retryable: err.is_timeout() || err.is_connect(),
        }
    }

    /// Build a Gateway error from a non-2xx provider response.
    /// 5xx is retryable, 4xx is caller-fixable and terminal.
    pub fn from_gateway_status(
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    ) -> Self {
        AppError::Gateway {
            provider,
            http_status: Some(status.as_u16()),
            message: body,
            retryable: status.is_server_error(),
        }
    }
}

/// Helper for the common "looked it up, wasn't there" pattern.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Verification(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Gateway {
                provider, message, ..
            } => {
                // The specific cause stays server-side; payers get a generic
                // failure they can act on (retry checkout).
                tracing::error!("{} gateway error: {}", provider, message);
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment failed, please try again".to_string(),
                )
            }
            AppError::LedgerInvariant(msg) => {
                tracing::error!("Ledger invariant violated: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Json(e) => (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_5xx_is_retryable() {
        let err = AppError::from_gateway_status(
            "paypal",
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "upstream down".into(),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn gateway_4xx_is_terminal() {
        let err = AppError::from_gateway_status(
            "mollie",
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            "bad amount".into(),
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn verification_is_never_retryable() {
        assert!(!AppError::Verification("bad signature".into()).is_retryable());
    }
}
