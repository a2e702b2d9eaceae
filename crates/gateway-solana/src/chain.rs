//! Read-only access to a confirmed Solana transaction's token-balance tables.
//!
//! This gateway never builds, signs, or simulates a transaction — it only
//! reads one back that the payer already broadcast and confirmed elsewhere.
//! That asymmetry with the teacher's `SolanaChainProviderLike` (which exists
//! to *settle* a payment) is why the trait below exposes exactly one method.

use async_trait::async_trait;
use solana_account_decoder_client_types::token::UiTokenAmount;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_rpc_client_api::config::RpcTransactionConfig;
use solana_transaction_status_client_types::option_serializer::OptionSerializer;
use solana_transaction_status_client_types::{
    EncodedTransactionWithStatusMeta, UiTransactionEncoding,
};
use std::str::FromStr;
use thiserror::Error;

/// A single token-balance table entry, keyed by the index of the account it
/// describes within the transaction's account list, with the amount already
/// resolved to base units (the integer form `UiTokenAmount::amount` carries
/// as a string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub account_index: u8,
    pub mint: String,
    pub amount: i128,
}

/// The parts of a confirmed transaction the verifier needs: whether it
/// executed successfully, and its pre/post token-balance tables.
#[derive(Debug, Clone, Default)]
pub struct ConfirmedTransaction {
    pub succeeded: bool,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transaction signature is not a valid base58 signature: {0}")]
    InvalidSignature(String),
    #[error("chain rpc call failed: {0}")]
    Rpc(String),
}

/// Fetches a confirmed transaction and exposes its token-balance tables.
/// Shaped around `get_transaction` and nothing else: a deliberately smaller
/// surface than a settlement-capable chain provider.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_transaction(
        &self,
        tx_signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, ChainError>;
}

/// `ChainClient` backed by a real `solana-client` nonblocking `RpcClient`,
/// reading at `confirmed` commitment.
pub struct SolanaChainClient {
    rpc: RpcClient,
}

impl SolanaChainClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        SolanaChainClient {
            rpc: RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed()),
        }
    }
}

#[async_trait]
impl ChainClient for SolanaChainClient {
    async fn get_transaction(
        &self,
        tx_signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, ChainError> {
        let signature = solana_signature::Signature::from_str(tx_signature)
            .map_err(|err| ChainError::InvalidSignature(err.to_string()))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        let response = match self
            .rpc
            .get_transaction_with_config(&signature, config)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let message = err.to_string();
                if message.contains("not found") || message.contains("null") {
                    return Ok(None);
                }
                return Err(ChainError::Rpc(message));
            }
        };

        let EncodedTransactionWithStatusMeta { meta, .. } = response.transaction;
        let Some(meta) = meta else {
            return Ok(Some(ConfirmedTransaction::default()));
        };

        let succeeded = meta.err.is_none();
        let pre_token_balances = as_vec(meta.pre_token_balances)
            .into_iter()
            .map(as_token_balance)
            .collect();
        let post_token_balances = as_vec(meta.post_token_balances)
            .into_iter()
            .map(as_token_balance)
            .collect();

        Ok(Some(ConfirmedTransaction {
            succeeded,
            pre_token_balances,
            post_token_balances,
        }))
    }
}

/// Lets a boxed trait object stand in for a concrete `ChainClient`, so the
/// pipeline's `PaymentVerifier` can hold `Box<dyn ChainClient>` without the
/// verifier itself needing to become trait-object-aware.
#[async_trait]
impl ChainClient for Box<dyn ChainClient> {
    async fn get_transaction(
        &self,
        tx_signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, ChainError> {
        (**self).get_transaction(tx_signature).await
    }
}

fn as_vec<T>(value: OptionSerializer<Vec<T>>) -> Vec<T> {
    match value {
        OptionSerializer::Some(items) => items,
        OptionSerializer::None | OptionSerializer::Skip => Vec::new(),
    }
}

fn as_token_balance(
    balance: solana_transaction_status_client_types::UiTransactionTokenBalance,
) -> TokenBalance {
    TokenBalance {
        account_index: balance.account_index,
        mint: balance.mint,
        amount: base_units(&balance.ui_token_amount),
    }
}

fn base_units(ui_amount: &UiTokenAmount) -> i128 {
    ui_amount.amount.parse().unwrap_or(0)
}
