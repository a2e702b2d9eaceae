//! Wire types and data model shared across the archivepay gateway crates.
//!
//! Grounded on the `x402-rs` facilitator's own type layer (`x402-types`):
//! small, independently serializable newtypes rather than one monolithic
//! protocol module.

pub mod address;
pub mod b64;
pub mod invoice;
pub mod money;
pub mod payment;
pub mod rpc;
pub mod timestamp;

pub use address::{Address, AddressError};
pub use invoice::{DEFAULT_INVOICE_TTL_SECONDS, Invoice};
pub use payment::{PaymentAccept, PaymentReceipt, PaymentRequiredBody, SettlementResult};
pub use rpc::{JsonRpcErrorEnvelope, JsonRpcRequest};
pub use timestamp::Timestamp;
