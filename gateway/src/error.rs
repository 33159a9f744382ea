//! Layered error types for the wallet gateway.
//!
//! - [`DomainError`] - Validation-level errors, surfaced to clients
//! - [`InfraError`] - Infrastructure errors (database, RPC, cache, serialization)
//! - [`AppError`] - Application-level errors combining domain and infra
//! - [`ApiError`] - HTTP API errors with status codes
//!
//! # Error Philosophy
//!
//! - Domain errors are recoverable and user-facing; they map to HTTP 400
//!   with the `{errors:[{id, message}]}` envelope.
//! - Infrastructure errors are logged but their details are hidden from
//!   clients behind a generic HTTP 500.
//! - The `Result` type alias uses `AppError` for application code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// The reason a nonce was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceReason {
    /// Lower than the expected next nonce.
    TooLow,
    /// Higher than the expected next nonce.
    TooHigh,
    /// A non-error row already exists at this `(sender, nonce)`.
    AlreadyUsed,
}

impl NonceReason {
    const fn message(self) -> &'static str {
        match self {
            Self::TooLow => "nonce too low",
            Self::TooHigh => "nonce too high",
            Self::AlreadyUsed => "Nonce already used",
        }
    }
}

/// The reason a signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureReason {
    /// Detached signature was not exactly 65 bytes (132 hex chars with `0x`).
    InvalidLength,
    /// Detached signature failed hex decoding.
    InvalidHexValue,
    /// Attached and detached signatures disagree, or recovered sender
    /// doesn't match the claimed `from_address`.
    DoesNotMatch,
}

impl SignatureReason {
    const fn message(self) -> &'static str {
        match self {
            Self::InvalidLength => "invalid length",
            Self::InvalidHexValue => "invalid hex value",
            Self::DoesNotMatch => "signature in payload and signature of transaction do not match",
        }
    }
}

/// Domain-level errors representing client-facing validation failures.
///
/// Each variant corresponds to one of the error kinds named in the
/// gateway's external interface: `invalid_address`, `invalid_value`,
/// `invalid_nonce`, `invalid_gas`, `invalid_gas_price`, `invalid_data`,
/// `invalid_transaction`, `invalid_signature`, `missing_signature`,
/// `insufficient_funds`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Malformed `from`/`to` address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Negative, unparseable, or otherwise malformed value.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Nonce failed validation, for the given reason.
    #[error("invalid nonce: {}", .reason.message())]
    InvalidNonce {
        /// Why the nonce was rejected.
        reason: NonceReason,
    },

    /// Gas limit malformed or would be rejected by the protocol (e.g.
    /// intrinsic gas too low for the data payload).
    #[error("invalid gas: {0}")]
    InvalidGas(String),

    /// Gas price malformed.
    #[error("invalid gas price: {0}")]
    InvalidGasPrice(String),

    /// Calldata not decodable hex or byte string.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The envelope would be rejected by the protocol (distinct from a
    /// single malformed field — this is a structural defect).
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Signature failed validation, for the given reason.
    #[error("invalid signature: {}", .reason.message())]
    InvalidSignature {
        /// Why the signature was rejected.
        reason: SignatureReason,
    },

    /// Envelope is unsigned and no detached signature was supplied.
    #[error("missing signature")]
    MissingSignature,

    /// Sender's balance cannot cover `value + gas * gas_price`.
    #[error("insufficient funds")]
    InsufficientFunds,
}

impl DomainError {
    /// The client-facing error id, matching the gateway's documented error
    /// kinds (`invalid_address`, `invalid_nonce`, …).
    #[must_use]
    pub const fn id(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidValue(_) => "invalid_value",
            Self::InvalidNonce { .. } => "invalid_nonce",
            Self::InvalidGas(_) => "invalid_gas",
            Self::InvalidGasPrice(_) => "invalid_gas_price",
            Self::InvalidData(_) => "invalid_data",
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::MissingSignature => "missing_signature",
            Self::InsufficientFunds => "insufficient_funds",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
///
/// These errors are typically logged but their details are hidden from
/// clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON-RPC / chain client communication failure.
    #[error("RPC error: {0}")]
    Rpc(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Cache backend failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Notification transport failure (ws/gcm/apn dispatch).
    #[error("notification transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found in storage.
    #[error("resource not found")]
    NotFound,

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Timeout waiting for operation.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A chain log did not decode into the ABI shape the caller expected.
    #[error("event decoding error: {0}")]
    EventDecoding(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Client-facing validation error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Reorg walk-back exceeded the maximum trailing depth without finding
    /// a common ancestor.
    #[error("reorg too deep: searched back {searched} blocks without finding a common ancestor")]
    ReorgTooDeep {
        /// Blocks walked back before giving up.
        searched: u64,
    },

    /// Configuration error at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error at startup.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown requested.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// API ERRORS (HTTP-specific)
// ═══════════════════════════════════════════════════════════════════════════════

/// API-level errors with HTTP status codes.
///
/// These errors are converted to HTTP responses via [`IntoResponse`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Wrapped application error.
    #[error(transparent)]
    App(#[from] AppError),

    /// Rate limit exceeded.
    #[error("rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until rate limit resets.
        retry_after_secs: u64,
    },

    /// Invalid request parameters caught before reaching domain validation
    /// (malformed JSON, missing required field, etc).
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Authentication required or failed.
    #[error("unauthorized")]
    Unauthorized,

    /// Internal server error (with source for logging).
    #[error("internal error")]
    Internal(#[source] eyre::Report),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, id, message) = match &self {
            Self::App(AppError::Domain(domain)) => {
                (StatusCode::BAD_REQUEST, domain.id(), domain.to_string())
            }

            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),

            Self::RateLimited { retry_after_secs } => {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("Retry-After", retry_after_secs.to_string())],
                    Json(json!({
                        "errors": [{
                            "id": "rate_limited",
                            "message": self.to_string(),
                        }]
                    })),
                )
                    .into_response();
            }

            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),

            // Node-communication and internal failures: log but don't expose details.
            Self::App(
                AppError::Infra(_)
                | AppError::ReorgTooDeep { .. }
                | AppError::Config(_)
                | AppError::Initialization(_)
                | AppError::ShutdownRequested,
            )
            | Self::Internal(_) => {
                tracing::error!(error = ?self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unexpected_error",
                    "internal error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "errors": [{
                    "id": id,
                    "message": message,
                }]
            })),
        )
            .into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVENIENCE CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

impl From<crate::types::primitives::InvalidAddress> for DomainError {
    fn from(err: crate::types::primitives::InvalidAddress) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<crate::types::primitives::InvalidAmount> for DomainError {
    fn from(err: crate::types::primitives::InvalidAmount) -> Self {
        Self::InvalidValue(err.to_string())
    }
}

impl From<crate::types::primitives::InvalidAddress> for AppError {
    fn from(err: crate::types::primitives::InvalidAddress) -> Self {
        Self::Domain(err.into())
    }
}

impl From<crate::types::primitives::InvalidAmount> for AppError {
    fn from(err: crate::types::primitives::InvalidAmount) -> Self {
        Self::Domain(err.into())
    }
}

impl From<chain_client::ProviderError> for InfraError {
    fn from(err: chain_client::ProviderError) -> Self {
        Self::Rpc(Box::new(err))
    }
}

impl From<chain_client::ProviderError> for AppError {
    fn from(err: chain_client::ProviderError) -> Self {
        Self::Infra(err.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_id_matches_documented_kind() {
        assert_eq!(
            DomainError::InsufficientFunds.id(),
            "insufficient_funds"
        );
        assert_eq!(
            DomainError::InvalidNonce { reason: NonceReason::TooLow }.id(),
            "invalid_nonce"
        );
    }

    #[test]
    fn nonce_reason_messages_are_distinct() {
        assert_ne!(NonceReason::TooLow.message(), NonceReason::TooHigh.message());
        assert_eq!(NonceReason::AlreadyUsed.message(), "Nonce already used");
    }

    #[test]
    fn app_error_from_domain() {
        let domain = DomainError::MissingSignature;
        let app: AppError = domain.into();
        assert!(matches!(app, AppError::Domain(DomainError::MissingSignature)));
    }

    #[test]
    fn app_error_from_infra() {
        let infra = InfraError::NotFound;
        let app: AppError = infra.into();
        assert!(matches!(app, AppError::Infra(InfraError::NotFound)));
    }

    #[test]
    fn signature_reason_messages() {
        assert_eq!(SignatureReason::InvalidLength.message(), "invalid length");
        assert_eq!(SignatureReason::InvalidHexValue.message(), "invalid hex value");
    }
}
