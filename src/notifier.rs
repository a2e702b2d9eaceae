//! Settlement notifier — best-effort async notification of an external
//! facilitator, `spec.md` §4.7. Never part of the decision to serve the
//! RPC response; any outcome collapses to a boolean `settled`.

use std::time::Duration;

const SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SettlementNotifier {
    client: reqwest::Client,
    settle_url: Option<String>,
    chain: String,
}

impl SettlementNotifier {
    pub fn new(settle_url: Option<String>, chain: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SETTLEMENT_TIMEOUT)
            .build()
            .expect("settlement http client");
        SettlementNotifier {
            client,
            settle_url,
            chain: chain.into(),
        }
    }

    pub fn disabled(chain: impl Into<String>) -> Self {
        SettlementNotifier::new(None, chain)
    }

    /// POSTs `{txSignature, paymentId, chain}` to the optional facilitator.
    /// When no facilitator is configured there is nothing left to settle,
    /// so this reports `true`; `false` is reserved for an actual
    /// notification attempt that failed (network error, non-2xx response).
    /// Never surfaced as an `Err`.
    pub async fn notify(&self, tx_signature: &str, payment_id: &str) -> bool {
        let Some(url) = &self.settle_url else {
            return true;
        };

        let body = serde_json::json!({
            "txSignature": tx_signature,
            "paymentId": payment_id,
            "chain": self.chain,
        });

        match self.client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), payment_id, "settlement notification rejected");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, payment_id, "settlement notification unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn disabled_notifier_reports_settled_with_nothing_to_notify() {
        let notifier = SettlementNotifier::disabled("solana");
        assert!(notifier.notify("sig", "payment-id").await);
    }

    #[tokio::test]
    async fn successful_notification_reports_settled() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;
        let notifier = SettlementNotifier::new(Some(mock.uri()), "solana");
        assert!(notifier.notify("sig", "payment-id").await);
    }

    #[tokio::test]
    async fn failed_notification_reports_unsettled() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;
        let notifier = SettlementNotifier::new(Some(mock.uri()), "solana");
        assert!(!notifier.notify("sig", "payment-id").await);
    }
}
