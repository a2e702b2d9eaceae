//! Pipeline error taxonomy and its HTTP/JSON-RPC rendering — `spec.md` §7.
//!
//! Grounded on `src/handlers.rs`'s `IntoResponse for FacilitatorLocalError`:
//! one error enum per pipeline outcome, each mapped to the exact status
//! code and body shape the wire contract specifies, rather than a single
//! catch-all error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_types::payment::{PaymentAccept, PaymentRequiredBody};
use gateway_types::rpc::{JSON_RPC_INVALID_REQUEST, JsonRpcErrorEnvelope};
use serde_json::Value;

/// Every terminal non-200 outcome of the request pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Malformed JSON-RPC envelope: HTTP 400, JSON-RPC code -32600.
    Protocol { id: Value, message: String },
    /// `X-Payment` header was not valid base64 or not valid JSON.
    InvalidPaymentHeader,
    /// Header decoded but `txSignature`/`paymentId` are missing or malformed.
    InvalidPaymentPayload(&'static str),
    /// No invoice found for the given (or a missing) `paymentId`; a fresh
    /// invoice is minted and offered.
    PaymentRequired { message: String, accept: PaymentAccept },
    /// The invoice was already consumed by a prior request.
    PaymentAlreadyUsed,
    /// On-chain (or facilitator) verification rejected the receipt.
    PaymentInvalid { reason: String },
    /// The invoice store could not be read or written.
    StoreUnavailable,
    /// MARK-USED failed after verification succeeded: the caller has
    /// already paid: this is logged loudly for manual reconciliation.
    Internal { message: String },
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        match self {
            PipelineError::Protocol { id, message } => {
                let envelope = JsonRpcErrorEnvelope::new(id, JSON_RPC_INVALID_REQUEST, message);
                (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
            }
            PipelineError::InvalidPaymentHeader => payment_error(
                StatusCode::PAYMENT_REQUIRED,
                "invalid_payment_header",
                "X-Payment header is not valid base64-encoded JSON",
                None,
            ),
            PipelineError::InvalidPaymentPayload(detail) => payment_error(
                StatusCode::PAYMENT_REQUIRED,
                "invalid_payment_payload",
                detail,
                None,
            ),
            PipelineError::PaymentRequired { message, accept } => {
                let body = PaymentRequiredBody::new("payment_required", message, accept);
                (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
            }
            PipelineError::PaymentAlreadyUsed => payment_error(
                StatusCode::PAYMENT_REQUIRED,
                "payment_already_used",
                "this payment id has already been consumed",
                None,
            ),
            PipelineError::PaymentInvalid { reason } => payment_error(
                StatusCode::PAYMENT_REQUIRED,
                "payment_invalid",
                "payment verification failed",
                Some(reason),
            ),
            PipelineError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": "store_unavailable"})),
            )
                .into_response(),
            PipelineError::Internal { message } => {
                tracing::error!(message, "post-payment handler error, invoice consumed but not proxied");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "internal_error"})),
                )
                    .into_response()
            }
        }
    }
}

fn payment_error(status: StatusCode, error: &str, message: impl Into<String>, details: Option<String>) -> Response {
    let mut body = serde_json::json!({
        "error": error,
        "message": message.into(),
    });
    if let Some(details) = details {
        body["details"] = Value::String(details);
    }
    (status, Json(body)).into_response()
}
