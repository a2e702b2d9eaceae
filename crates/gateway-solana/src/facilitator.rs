//! Optional external facilitator pre-check.
//!
//! Per the Open Question in `spec.md` §9 ("facilitator response shape"):
//! the facilitator was written against an unspecified API, so this client
//! scans the raw JSON response for any of `verified`, `valid`, or
//! `status == "success"` rather than pinning one provider's schema. A
//! `true` result here is trusted outright; anything else — a `false`
//! match, a non-2xx response, or a transport error — falls through to the
//! on-chain algorithm without surfacing an error of its own.

use serde_json::Value;
use std::time::Duration;

/// Timeout for the facilitator pre-check, per `spec.md` §5.
const FACILITATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for an optional external payment-verification facilitator.
/// Never load-bearing: its only effect is to short-circuit the on-chain
/// verification algorithm when it reports success.
pub struct FacilitatorVerifier {
    client: reqwest::Client,
    verify_url: Option<String>,
}

impl FacilitatorVerifier {
    /// `verify_url`: `None` disables the pre-check outright, matching the
    /// `facilitator_verify_url` config key being absent.
    pub fn new(verify_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FACILITATOR_TIMEOUT)
            .build()
            .expect("facilitator http client");
        FacilitatorVerifier { client, verify_url }
    }

    pub fn disabled() -> Self {
        FacilitatorVerifier::new(None)
    }

    /// Returns `true` only when the facilitator is configured, reachable,
    /// and its response scans as an affirmative verification. Any other
    /// outcome — disabled, unreachable, or a negative/ambiguous response —
    /// returns `false` so the caller falls through to on-chain verification.
    pub async fn precheck(&self, tx_signature: &str, payment_id: &str) -> bool {
        let Some(url) = &self.verify_url else {
            return false;
        };
        let body = serde_json::json!({
            "txSignature": tx_signature,
            "paymentId": payment_id,
        });
        let response = match self.client.post(url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "facilitator pre-check unreachable, falling through to on-chain verification");
                return false;
            }
        };
        if !response.status().is_success() {
            return false;
        }
        match response.json::<Value>().await {
            Ok(value) => scans_as_verified(&value),
            Err(_) => false,
        }
    }
}

fn scans_as_verified(value: &Value) -> bool {
    truthy(value.get("verified")) || truthy(value.get("valid")) || status_success(value.get("status"))
}

fn truthy(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn status_success(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if s == "success")
}
