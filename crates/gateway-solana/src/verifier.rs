//! The on-chain SPL-token transfer verification algorithm, `spec.md` §4.3.

use crate::chain::{ChainClient, ConfirmedTransaction, TokenBalance};
use crate::facilitator::FacilitatorVerifier;

pub use gateway_types::money::to_base_units;

/// The tolerance absorbing rounding from decimal -> integer base-unit
/// conversion. Exists only for that reason; never loosen it to cover fees
/// or any other effect without also widening the documented contract.
const VERIFICATION_TOLERANCE_BASE_UNITS: i128 = 100;

#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub tx_signature: String,
    pub payment_id: String,
    pub expected_amount_base_units: i128,
    pub mint: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl VerificationResult {
    fn accept() -> Self {
        VerificationResult {
            valid: true,
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        VerificationResult {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a receipt proves an on-chain transfer of the required
/// amount of the required mint. Never returns an `Err`: every failure mode,
/// including a chain-client transport error, collapses to `valid: false`
/// with a `reason`, per the "verifier never throws past its contract" rule.
pub struct PaymentVerifier<C: ChainClient> {
    chain: C,
    facilitator: FacilitatorVerifier,
}

impl<C: ChainClient> PaymentVerifier<C> {
    pub fn new(chain: C, facilitator: FacilitatorVerifier) -> Self {
        PaymentVerifier { chain, facilitator }
    }

    pub async fn verify(&self, request: &VerificationRequest) -> VerificationResult {
        if self
            .facilitator
            .precheck(&request.tx_signature, &request.payment_id)
            .await
        {
            return VerificationResult::accept();
        }

        let transaction = match self.chain.get_transaction(&request.tx_signature).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return VerificationResult::reject("tx not found"),
            Err(err) => {
                tracing::warn!(error = %err, "chain client unreachable during verification, failing closed");
                return VerificationResult::reject(format!("tx not found: {err}"));
            }
        };

        if !transaction.succeeded {
            return VerificationResult::reject("tx failed");
        }

        if transaction.pre_token_balances.is_empty() || transaction.post_token_balances.is_empty() {
            return VerificationResult::reject("no token balance changes");
        }

        evaluate(&transaction, request)
    }
}

fn evaluate(transaction: &ConfirmedTransaction, request: &VerificationRequest) -> VerificationResult {
    let mut wrong_mint: Option<(&str, &str)> = None;

    for post in &transaction.post_token_balances {
        let Some(pre) = find_by_account_index(&transaction.pre_token_balances, post.account_index) else {
            continue;
        };

        if post.mint != request.mint {
            wrong_mint = Some((post.mint.as_str(), request.mint.as_str()));
            continue;
        }

        let delta = post.amount - pre.amount;
        if delta > 0
            && (delta - request.expected_amount_base_units).abs() < VERIFICATION_TOLERANCE_BASE_UNITS
        {
            return VerificationResult::accept();
        }
    }

    if let Some((actual, expected)) = wrong_mint {
        return VerificationResult::reject(format!("wrong mint: actual={actual} expected={expected}"));
    }

    VerificationResult::reject(format!(
        "no valid transfer of {} to {}",
        request.expected_amount_base_units, request.recipient
    ))
}

fn find_by_account_index(balances: &[TokenBalance], account_index: u8) -> Option<&TokenBalance> {
    balances.iter().find(|b| b.account_index == account_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChainClient;

    fn request(expected: i128) -> VerificationRequest {
        VerificationRequest {
            tx_signature: "sig".to_string(),
            payment_id: "11111111-1111-1111-1111-111111111111".to_string(),
            expected_amount_base_units: expected,
            mint: "MintA".to_string(),
            recipient: "Recipient".to_string(),
        }
    }

    #[tokio::test]
    async fn accepts_matching_transfer() {
        let chain = FakeChainClient::new()
            .with_transaction("sig", FakeChainClient::confirmed_transfer("MintA", 1_000_000, 1_001_000));
        let verifier = PaymentVerifier::new(chain, FacilitatorVerifier::disabled());
        let result = verifier.verify(&request(1_000)).await;
        assert!(result.valid);
    }

    #[tokio::test]
    async fn accepts_at_tolerance_boundary_99() {
        let chain = FakeChainClient::new()
            .with_transaction("sig", FakeChainClient::confirmed_transfer("MintA", 0, 1_099));
        let verifier = PaymentVerifier::new(chain, FacilitatorVerifier::disabled());
        let result = verifier.verify(&request(1_000)).await;
        assert!(result.valid);
    }

    #[tokio::test]
    async fn rejects_at_tolerance_boundary_100() {
        let chain = FakeChainClient::new()
            .with_transaction("sig", FakeChainClient::confirmed_transfer("MintA", 0, 1_100));
        let verifier = PaymentVerifier::new(chain, FacilitatorVerifier::disabled());
        let result = verifier.verify(&request(1_000)).await;
        assert!(!result.valid);
    }

    #[tokio::test]
    async fn rejects_wrong_mint_with_both_mints_in_reason() {
        let chain = FakeChainClient::new()
            .with_transaction("sig", FakeChainClient::confirmed_transfer("MintX", 0, 1_000));
        let verifier = PaymentVerifier::new(chain, FacilitatorVerifier::disabled());
        let result = verifier.verify(&request(1_000)).await;
        assert!(!result.valid);
        let reason = result.reason.unwrap();
        assert!(reason.contains("wrong mint"));
        assert!(reason.contains("MintX"));
        assert!(reason.contains("MintA"));
    }

    #[tokio::test]
    async fn rejects_tx_not_found() {
        let chain = FakeChainClient::new();
        let verifier = PaymentVerifier::new(chain, FacilitatorVerifier::disabled());
        let result = verifier.verify(&request(1_000)).await;
        assert_eq!(result.reason.as_deref(), Some("tx not found"));
    }

    #[tokio::test]
    async fn rejects_failed_transaction() {
        let mut tx = FakeChainClient::confirmed_transfer("MintA", 0, 1_000);
        tx.succeeded = false;
        let chain = FakeChainClient::new().with_transaction("sig", tx);
        let verifier = PaymentVerifier::new(chain, FacilitatorVerifier::disabled());
        let result = verifier.verify(&request(1_000)).await;
        assert_eq!(result.reason.as_deref(), Some("tx failed"));
    }
}
