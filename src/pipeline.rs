//! The request pipeline — `spec.md` §4.6: challenge -> parse receipt ->
//! verify -> mark used -> proxy -> emit receipt header.
//!
//! Implemented as a single `axum` handler behind a typed `AppState`,
//! grounded on how `src/handlers.rs`/`facilitator/src/run.rs` wire their
//! routes: a `Clone`-able state carrying every collaborator the pipeline
//! needs, built once at startup.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use gateway_solana::{ChainClient, PaymentVerifier, VerificationRequest};
use gateway_store::InvoiceStore;
use gateway_types::address::Address;
use gateway_types::invoice::Invoice;
use gateway_types::money::DEFAULT_MINT_DECIMALS;
use gateway_types::payment::{PaymentAccept, PaymentReceipt, SettlementResult, format_amount};
use gateway_types::rpc::JsonRpcRequest;
use gateway_types::{b64, timestamp::Timestamp};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::notifier::SettlementNotifier;
use crate::pricing::{self, PricingTable};
use crate::proxy::UpstreamProxy;
use crate::registry::ProviderRegistry;

const X_PAYMENT_HEADER: &str = "x-payment";
const X_PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";
const MIN_TX_SIGNATURE_LEN: usize = 80;
const MAX_TX_SIGNATURE_LEN: usize = 100;

/// Every collaborator the pipeline depends on, built once at startup and
/// shared (via cheap `Arc` clones) across concurrently-handled requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvoiceStore>,
    pub pricing: Arc<PricingTable>,
    pub verifier: Arc<PaymentVerifier<Box<dyn ChainClient>>>,
    pub registry: Arc<ProviderRegistry>,
    pub proxy: Arc<UpstreamProxy>,
    pub notifier: Arc<SettlementNotifier>,
    pub mint: Address,
    pub recipient: Address,
    pub asset_symbol: String,
    pub chain_tag: String,
    pub invoice_ttl_seconds: u64,
    pub mint_decimals: u32,
}

impl AppState {
    pub fn mint_decimals_or_default(&self) -> u32 {
        if self.mint_decimals == 0 {
            DEFAULT_MINT_DECIMALS
        } else {
            self.mint_decimals
        }
    }
}

/// `POST /`: the single route this gateway serves.
///
/// The body is taken as raw bytes rather than through axum's `Json`
/// extractor: a body that fails to deserialize into a `JsonRpcRequest`
/// (missing `method`/`jsonrpc`, wrong JSON types, or not valid JSON at
/// all) is still a protocol error per `spec.md` §6/§7, and must get the
/// JSON-RPC `-32600` error envelope, not axum's plain-text `JsonRejection`
/// body.
pub async fn handle(State(state): State<AppState>, headers: axum::http::HeaderMap, body: Bytes) -> Response {
    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(response) => return response,
    };

    if let Err(err) = envelope.validate() {
        return PipelineError::Protocol {
            id: envelope.id.clone(),
            message: err.to_string(),
        }
        .into_response();
    }

    match headers
        .get(X_PAYMENT_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        None => mint_challenge(&state, &envelope, "Payment required to access this method").await,
        Some(header_value) => pay(&state, &envelope, header_value).await,
    }
}

/// Parses the request body into a `JsonRpcRequest`, returning the
/// `-32600` protocol-error response directly on any failure so the
/// caller never has to fall back to axum's default rejection body.
fn parse_envelope(body: &[u8]) -> Result<JsonRpcRequest, Response> {
    let value: Value = serde_json::from_slice(body).map_err(|err| {
        PipelineError::Protocol {
            id: Value::Null,
            message: format!("request body is not valid JSON: {err}"),
        }
        .into_response()
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);

    serde_json::from_value(value).map_err(|err| {
        PipelineError::Protocol {
            id,
            message: format!("malformed JSON-RPC envelope: {err}"),
        }
        .into_response()
    })
}

async fn mint_challenge(state: &AppState, envelope: &JsonRpcRequest, message: &str) -> Response {
    let amount = state.pricing.price(envelope);
    let payment_id = Uuid::new_v4();
    let invoice = Invoice::new(
        payment_id,
        amount,
        state.mint.clone(),
        state.recipient.clone(),
        envelope.method.clone(),
        state.invoice_ttl_seconds,
    );

    if let Err(err) = state.store.create(invoice).await {
        tracing::error!(error = %err, "invoice store unavailable while minting a payment challenge");
        return PipelineError::StoreUnavailable.into_response();
    }

    let accept = PaymentAccept {
        asset: state.asset_symbol.clone(),
        chain: state.chain_tag.clone(),
        amount: format_amount(amount),
        payment_address: state.recipient.clone(),
        payment_id,
        scheme: "exact".to_string(),
        method: envelope.method.clone(),
    };
    PipelineError::PaymentRequired {
        message: message.to_string(),
        accept,
    }
    .into_response()
}

async fn pay(state: &AppState, envelope: &JsonRpcRequest, header_value: &str) -> Response {
    let decoded: Value = match b64::decode(header_value) {
        Ok(value) => value,
        Err(_) => return PipelineError::InvalidPaymentHeader.into_response(),
    };

    let tx_signature = match decoded.get("txSignature").and_then(Value::as_str) {
        Some(sig) if (MIN_TX_SIGNATURE_LEN..=MAX_TX_SIGNATURE_LEN).contains(&sig.len()) => {
            sig.to_string()
        }
        Some(_) => {
            return PipelineError::InvalidPaymentPayload("txSignature has an invalid length")
                .into_response();
        }
        None => {
            return PipelineError::InvalidPaymentPayload("txSignature is required").into_response();
        }
    };

    let payment_id = match decoded
        .get("paymentId")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
    {
        Some(id) => id,
        None => {
            return PipelineError::InvalidPaymentPayload("paymentId must be a uuid").into_response();
        }
    };

    let invoice = match state.store.get(payment_id).await {
        Ok(Some(invoice)) => invoice,
        Ok(None) => {
            return mint_challenge(state, envelope, "Payment ID not found or expired").await;
        }
        Err(err) => {
            tracing::error!(error = %err, %payment_id, "invoice store unavailable during lookup");
            return PipelineError::StoreUnavailable.into_response();
        }
    };

    if invoice.used {
        return PipelineError::PaymentAlreadyUsed.into_response();
    }

    let expected_amount_base_units =
        gateway_solana::to_base_units(invoice.amount, state.mint_decimals_or_default())
            .unwrap_or(i128::MAX);

    let verification = state
        .verifier
        .verify(&VerificationRequest {
            tx_signature: tx_signature.clone(),
            payment_id: payment_id.to_string(),
            expected_amount_base_units,
            mint: invoice.mint.as_str().to_string(),
            recipient: invoice.recipient.as_str().to_string(),
        })
        .await;

    if !verification.valid {
        return PipelineError::PaymentInvalid {
            reason: verification.reason.unwrap_or_else(|| "payment invalid".to_string()),
        }
        .into_response();
    }

    match state.store.mark_used(payment_id).await {
        Ok(true) => {}
        Ok(false) => return PipelineError::PaymentAlreadyUsed.into_response(),
        Err(err) => {
            tracing::error!(
                error = %err,
                %payment_id,
                %tx_signature,
                "mark-used failed after successful verification: caller has already paid, reconcile manually"
            );
            return PipelineError::Internal {
                message: "failed to mark invoice used".to_string(),
            }
            .into_response();
        }
    }

    let require_historical = pricing::requires_historical(&envelope.method);
    let (body, settled) = tokio::join!(
        state.proxy.forward(&state.registry, envelope, require_historical),
        state.notifier.notify(&tx_signature, &payment_id.to_string()),
    );

    respond_with_receipt(body, &tx_signature, payment_id, settled)
}

fn respond_with_receipt(body: Value, tx_signature: &str, payment_id: Uuid, settled: bool) -> Response {
    let settlement = SettlementResult {
        tx_signature: tx_signature.to_string(),
        payment_id,
        settled,
    };
    let mut response = Json(body).into_response();
    match b64::encode(&settlement) {
        Ok(encoded) => match HeaderValue::from_str(&encoded) {
            Ok(header_value) => {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(X_PAYMENT_RESPONSE_HEADER), header_value);
            }
            Err(err) => tracing::warn!(error = %err, "settlement receipt header not representable"),
        },
        Err(err) => tracing::warn!(error = %err, "failed to encode settlement receipt header"),
    }
    response
}

/// Receipt payload helper used by tests to build an `X-Payment` header.
pub fn encode_receipt(tx_signature: impl Into<String>, payment_id: Uuid) -> String {
    b64::encode(&PaymentReceipt {
        tx_signature: tx_signature.into(),
        payment_id,
    })
    .expect("receipt serializes")
}

/// `true` once `created_at + ttl_seconds` is in the past relative to now;
/// re-exported for the pipeline's own tests.
pub fn is_expired(invoice: &Invoice) -> bool {
    invoice.is_expired_at(Timestamp::now())
}
