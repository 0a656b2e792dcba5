//! Error types for the faucet service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;

use crate::ledger::{LedgerError, TokenBalance};
use crate::quota::QuotaStoreError;
use crate::tokens::{FundingAmount, TokenId};

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Rate limit exceeded until {reset_at}")]
    RateLimitExceeded {
        reset_at: DateTime<Utc>,
        remaining: u32,
    },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Insufficient balance even after funding. Required: {required} {token}, Available: {available}")]
    InsufficientFunds {
        token: TokenId,
        required: FundingAmount,
        available: TokenBalance,
    },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Transfer rejected: {0}")]
    TransferRejected(String),

    #[error(transparent)]
    QuotaStore(#[from] QuotaStoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for FaucetError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(_) | LedgerError::Timeout(_) => {
                FaucetError::LedgerUnavailable(err.to_string())
            }
            LedgerError::Rejected(msg) => FaucetError::TransferRejected(msg),
            LedgerError::InvalidRecipient(msg) => FaucetError::InvalidRecipient(msg),
            LedgerError::Signing(msg) => FaucetError::Internal(format!("signing failed: {}", msg)),
        }
    }
}

impl FaucetError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::Validation(_) | FaucetError::InvalidRecipient(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::InsufficientFunds { .. } | FaucetError::QuotaStore(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            FaucetError::LedgerUnavailable(_) => StatusCode::BAD_GATEWAY,
            FaucetError::TransferRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FaucetError::Config(_) | FaucetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, used as a metrics label too.
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::Validation(_) => "VALIDATION_FAILED",
            FaucetError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            FaucetError::InvalidRecipient(_) => "INVALID_RECIPIENT",
            FaucetError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            FaucetError::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
            FaucetError::TransferRejected(_) => "TRANSFER_REJECTED",
            FaucetError::QuotaStore(_) => "QUOTA_STORE_UNAVAILABLE",
            FaucetError::Config(_) => "CONFIG_ERROR",
            FaucetError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            FaucetError::Validation(_) => "Validation failed",
            FaucetError::RateLimitExceeded { .. } => "Rate limit exceeded",
            FaucetError::InvalidRecipient(_) => "Invalid recipient",
            FaucetError::InsufficientFunds { .. } => "Insufficient funds",
            FaucetError::LedgerUnavailable(_) => "Ledger unavailable",
            FaucetError::TransferRejected(_) => "Transfer rejected",
            FaucetError::QuotaStore(_) => "Rate limit store unavailable",
            FaucetError::Config(_) | FaucetError::Internal(_) => "Internal server error",
        }
    }

    /// Render as an HTTP response. With `expose_internal` unset, server-side
    /// failures carry no detail beyond their summary.
    pub fn to_response(&self, expose_internal: bool) -> Response {
        let status = self.status_code();

        let body = match self {
            FaucetError::Validation(details) => json!({
                "success": false,
                "error": self.summary(),
                "code": self.code(),
                "details": details,
            }),
            FaucetError::RateLimitExceeded {
                reset_at,
                remaining,
            } => json!({
                "success": false,
                "error": self.summary(),
                "code": self.code(),
                "resetAt": reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                "remaining": remaining,
            }),
            _ => {
                let mut body = json!({
                    "success": false,
                    "error": self.summary(),
                    "code": self.code(),
                    "timestamp": Utc::now().to_rfc3339(),
                });
                if expose_internal || !status.is_server_error() {
                    body["message"] = json!(self.to_string());
                }
                body
            }
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        self.to_response(true)
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
