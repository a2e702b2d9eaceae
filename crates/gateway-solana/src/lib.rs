//! Chain client and on-chain SPL-token transfer verifier.
//!
//! Grounded on the teacher's `x402-chain-solana` crate: the
//! [`chain::RpcClientLike`]-style trait wrapper over `solana-client`, shrunk to
//! the one read this gateway ever needs (fetch a confirmed transaction and
//! read its token-balance deltas) instead of the teacher's build/sign/simulate
//! surface, which exists to *settle* a payment rather than merely verify one
//! that already landed.

pub mod chain;
pub mod facilitator;
pub mod testing;
pub mod verifier;

pub use chain::{ChainClient, ChainError, ConfirmedTransaction, SolanaChainClient, TokenBalance};
pub use facilitator::FacilitatorVerifier;
pub use verifier::{PaymentVerifier, VerificationRequest, VerificationResult, to_base_units};
