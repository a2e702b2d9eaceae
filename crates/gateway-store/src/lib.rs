//! Invoice lifecycle store.
//!
//! Two backends behind one [`InvoiceStore`] trait: [`RedisInvoiceStore`] is
//! preferred, [`InMemoryInvoiceStore`] is the fallback. [`FallbackInvoiceStore`]
//! performs the boot-time probe once and pins whichever backend answered,
//! for the lifetime of the process — mirroring the fail-open-to-local
//! adapter policy of the invoice store this crate replaces.

mod fallback;
mod memory;
mod redis_store;

use async_trait::async_trait;
use gateway_types::Invoice;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use fallback::FallbackInvoiceStore;
pub use memory::InMemoryInvoiceStore;
pub use redis_store::RedisInvoiceStore;

/// A single, opaque error surfaced to callers for any store failure. The
/// store does not retry internally; callers (the pipeline) decide how to
/// react, and MUST fail closed.
#[derive(Debug, Error)]
#[error("store_unavailable: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub used: u64,
    pub unused: u64,
    pub backend: StoreBackend,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Inserts a brand new invoice. Reusing an existing id is a programming
    /// error: ids are always freshly generated by the caller.
    async fn create(&self, invoice: Invoice) -> Result<(), StoreError>;

    /// Returns `None` if the invoice is absent or has expired. Never
    /// returns a partially initialised invoice.
    async fn get(&self, payment_id: Uuid) -> Result<Option<Invoice>, StoreError>;

    /// Atomically transitions `used=false -> true`. Returns `true` if this
    /// call performed the transition, `false` if the invoice was already
    /// used (a no-op at this layer) or absent.
    async fn mark_used(&self, payment_id: Uuid) -> Result<bool, StoreError>;

    /// Unconditional removal.
    async fn delete(&self, payment_id: Uuid) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    fn backend(&self) -> StoreBackend;
}
