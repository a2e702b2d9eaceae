use async_trait::async_trait;
use dashmap::DashMap;
use gateway_types::{Invoice, Timestamp};
use uuid::Uuid;

use crate::{InvoiceStore, StoreBackend, StoreError, StoreStats};

/// In-process invoice store. Used as the fallback backend, and directly in
/// tests. Atomicity of `mark_used` relies on `DashMap`'s per-shard locking:
/// holding the `get_mut` guard for the whole read-modify-write prevents two
/// concurrent callers from both observing `used=false`.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    invoices: DashMap<Uuid, Invoice>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        InMemoryInvoiceStore {
            invoices: DashMap::new(),
        }
    }

    /// Evicts invoices whose TTL has elapsed. Intended to be called from a
    /// periodic background task every 15 minutes.
    pub fn sweep_expired(&self) {
        let now = Timestamp::now();
        self.invoices.retain(|_, invoice| !invoice.is_expired_at(now));
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn create(&self, invoice: Invoice) -> Result<(), StoreError> {
        self.invoices.insert(invoice.payment_id, invoice);
        Ok(())
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Invoice>, StoreError> {
        let now = Timestamp::now();
        let found = self.invoices.get(&payment_id).and_then(|entry| {
            if entry.is_expired_at(now) {
                None
            } else {
                Some(entry.clone())
            }
        });
        Ok(found)
    }

    async fn mark_used(&self, payment_id: Uuid) -> Result<bool, StoreError> {
        let now = Timestamp::now();
        let Some(mut entry) = self.invoices.get_mut(&payment_id) else {
            return Ok(false);
        };
        if entry.is_expired_at(now) || entry.used {
            return Ok(false);
        }
        entry.used = true;
        entry.used_at = Some(now);
        Ok(true)
    }

    async fn delete(&self, payment_id: Uuid) -> Result<(), StoreError> {
        self.invoices.remove(&payment_id);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let now = Timestamp::now();
        let mut used = 0u64;
        let mut unused = 0u64;
        for entry in self.invoices.iter() {
            if entry.is_expired_at(now) {
                continue;
            }
            if entry.used {
                used += 1;
            } else {
                unused += 1;
            }
        }
        Ok(StoreStats {
            total: used + unused,
            used,
            unused,
            backend: StoreBackend::Memory,
        })
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::Address;

    fn sample_invoice(payment_id: Uuid) -> Invoice {
        Invoice::new(
            payment_id,
            rust_decimal::Decimal::new(1000, 6),
            Address::new("11111111111111111111111111111111").unwrap(),
            Address::new("11111111111111111111111111111111").unwrap(),
            "getSlot".to_string(),
            900,
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryInvoiceStore::new();
        let id = Uuid::new_v4();
        store.create(sample_invoice(id)).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.payment_id, id);
        assert!(!fetched.used);
    }

    #[tokio::test]
    async fn mark_used_is_exactly_once() {
        let store = InMemoryInvoiceStore::new();
        let id = Uuid::new_v4();
        store.create(sample_invoice(id)).await.unwrap();
        assert!(store.mark_used(id).await.unwrap());
        assert!(!store.mark_used(id).await.unwrap());
        let fetched = store.get(id).await.unwrap().unwrap();
        assert!(fetched.used);
    }

    #[tokio::test]
    async fn mark_used_on_absent_invoice_returns_false() {
        let store = InMemoryInvoiceStore::new();
        assert!(!store.mark_used(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_id() {
        let store = InMemoryInvoiceStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_mark_used_only_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryInvoiceStore::new());
        let id = Uuid::new_v4();
        store.create(sample_invoice(id)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.mark_used(id).await.unwrap() }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
