use async_trait::async_trait;
use gateway_types::Invoice;
use uuid::Uuid;

use crate::memory::InMemoryInvoiceStore;
use crate::redis_store::RedisInvoiceStore;
use crate::{InvoiceStore, StoreBackend, StoreError, StoreStats};

enum Backend {
    Redis(RedisInvoiceStore),
    Memory(InMemoryInvoiceStore),
}

/// Preserves the fail-open-to-local policy as an adapter: the external KV
/// is attempted exactly once at construction. On any failure it pins the
/// in-memory backend for the rest of the process's life — there is no
/// background re-probe, because silently re-entering the external backend
/// mid-process would re-split the invoice space between the two stores.
pub struct FallbackInvoiceStore {
    backend: Backend,
}

impl FallbackInvoiceStore {
    /// `invoice_store_url`: empty string disables the external KV outright
    /// and goes straight to the in-memory backend.
    pub async fn connect(invoice_store_url: &str) -> Self {
        if invoice_store_url.is_empty() {
            tracing::info!("invoice store: no external KV configured, using in-memory backend");
            return FallbackInvoiceStore {
                backend: Backend::Memory(InMemoryInvoiceStore::new()),
            };
        }
        match RedisInvoiceStore::connect(invoice_store_url).await {
            Ok(store) => {
                tracing::info!("invoice store: connected to external KV backend");
                FallbackInvoiceStore {
                    backend: Backend::Redis(store),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "invoice store: external KV unavailable at boot, falling back to in-memory");
                FallbackInvoiceStore {
                    backend: Backend::Memory(InMemoryInvoiceStore::new()),
                }
            }
        }
    }

    /// Runs the periodic in-memory sweep, a no-op when the active backend
    /// is Redis (whose native key TTL handles expiry).
    pub fn sweep_expired(&self) {
        if let Backend::Memory(store) = &self.backend {
            store.sweep_expired();
        }
    }
}

#[async_trait]
impl InvoiceStore for FallbackInvoiceStore {
    async fn create(&self, invoice: Invoice) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Redis(store) => store.create(invoice).await,
            Backend::Memory(store) => store.create(invoice).await,
        }
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Invoice>, StoreError> {
        match &self.backend {
            Backend::Redis(store) => store.get(payment_id).await,
            Backend::Memory(store) => store.get(payment_id).await,
        }
    }

    async fn mark_used(&self, payment_id: Uuid) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Redis(store) => store.mark_used(payment_id).await,
            Backend::Memory(store) => store.mark_used(payment_id).await,
        }
    }

    async fn delete(&self, payment_id: Uuid) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Redis(store) => store.delete(payment_id).await,
            Backend::Memory(store) => store.delete(payment_id).await,
        }
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        match &self.backend {
            Backend::Redis(store) => store.stats().await,
            Backend::Memory(store) => store.stats().await,
        }
    }

    fn backend(&self) -> StoreBackend {
        match &self.backend {
            Backend::Redis(_) => StoreBackend::Redis,
            Backend::Memory(_) => StoreBackend::Memory,
        }
    }
}
