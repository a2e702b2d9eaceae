//! In-process test doubles. No live network or validator required to
//! exercise the verifier; grounded on the teacher's pattern of keeping a
//! `*Like` trait so a fake can stand in without touching `solana-client`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::chain::{ChainClient, ChainError, ConfirmedTransaction, TokenBalance};

/// A `ChainClient` double keyed by transaction signature. Tests register the
/// confirmed transaction they want `get_transaction` to return for a given
/// signature; unregistered signatures behave as "not found".
#[derive(Default)]
pub struct FakeChainClient {
    transactions: Mutex<HashMap<String, ConfirmedTransaction>>,
}

impl FakeChainClient {
    pub fn new() -> Self {
        FakeChainClient::default()
    }

    pub fn with_transaction(self, signature: impl Into<String>, tx: ConfirmedTransaction) -> Self {
        self.transactions
            .lock()
            .expect("fake chain client lock poisoned")
            .insert(signature.into(), tx);
        self
    }

    /// Convenience constructor for the common case: one credited account
    /// moving by `amount` base units of `mint`, in a successful transaction.
    pub fn confirmed_transfer(mint: impl Into<String>, pre_amount: i128, post_amount: i128) -> ConfirmedTransaction {
        let mint = mint.into();
        ConfirmedTransaction {
            succeeded: true,
            pre_token_balances: vec![TokenBalance {
                account_index: 0,
                mint: mint.clone(),
                amount: pre_amount,
            }],
            post_token_balances: vec![TokenBalance {
                account_index: 0,
                mint,
                amount: post_amount,
            }],
        }
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_transaction(
        &self,
        tx_signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, ChainError> {
        Ok(self
            .transactions
            .lock()
            .expect("fake chain client lock poisoned")
            .get(tx_signature)
            .cloned())
    }
}
