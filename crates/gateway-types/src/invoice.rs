use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;
use crate::timestamp::Timestamp;

/// Default invoice lifetime, per `invoice_ttl_seconds` default.
pub const DEFAULT_INVOICE_TTL_SECONDS: u64 = 900;

/// A minted billing invoice. `amount`, `mint`, `recipient`, and `method` are
/// immutable after construction; only `used`/`used_at` ever change, and only
/// once, from false/None to true/Some(_).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub mint: Address,
    pub recipient: Address,
    pub method: String,
    pub created_at: Timestamp,
    pub used: bool,
    pub used_at: Option<Timestamp>,
    pub ttl_seconds: u64,
}

impl Invoice {
    pub fn new(
        payment_id: Uuid,
        amount: Decimal,
        mint: Address,
        recipient: Address,
        method: String,
        ttl_seconds: u64,
    ) -> Self {
        Invoice {
            payment_id,
            amount,
            mint,
            recipient,
            method,
            created_at: Timestamp::now(),
            used: false,
            used_at: None,
            ttl_seconds,
        }
    }

    /// `true` once `created_at + ttl_seconds` has passed relative to `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now.as_secs() >= self.created_at.as_secs() + self.ttl_seconds
    }
}
