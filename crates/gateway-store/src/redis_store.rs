use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use gateway_types::Invoice;

use crate::{InvoiceStore, StoreBackend, StoreError, StoreStats};

/// A Lua script that atomically flips `used` from `false` to `true` on the
/// stored JSON blob and returns whether this call performed the transition.
/// A naive GET-then-SET from the client would lose the exactly-once
/// property under concurrency; this keeps the read-modify-write on the
/// server side in one round trip.
const MARK_USED_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 0
end
local invoice = cjson.decode(raw)
if invoice.used then
  return 0
end
invoice.used = true
invoice.used_at = ARGV[1]
local ttl = redis.call('TTL', KEYS[1])
redis.call('SET', KEYS[1], cjson.encode(invoice))
if ttl and ttl > 0 then
  redis.call('EXPIRE', KEYS[1], ttl)
end
return 1
"#;

fn key(payment_id: Uuid) -> String {
    format!("payment:{payment_id}")
}

/// Redis-backed invoice store. Preferred backend: per-key TTL is native,
/// and `mark_used` is atomic via a server-side Lua script.
pub struct RedisInvoiceStore {
    conn: ConnectionManager,
}

impl RedisInvoiceStore {
    /// Connects and probes with `PING`. Intended to be attempted exactly
    /// once at boot by `FallbackInvoiceStore`; on any failure the caller
    /// falls back to the in-memory backend and never retries this path.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|err| StoreError::new(format!("redis client: {err}")))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|err| StoreError::new(format!("redis connect: {err}")))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| StoreError::new(format!("redis ping: {err}")))?;
        Ok(RedisInvoiceStore { conn })
    }
}

#[async_trait]
impl InvoiceStore for RedisInvoiceStore {
    async fn create(&self, invoice: Invoice) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&invoice)
            .map_err(|err| StoreError::new(format!("serialize invoice: {err}")))?;
        let ttl = invoice.ttl_seconds.max(1);
        conn.set_ex::<_, _, ()>(key(invoice.payment_id), payload, ttl)
            .await
            .map_err(|err| StoreError::new(format!("redis set: {err}")))
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Invoice>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key(payment_id))
            .await
            .map_err(|err| StoreError::new(format!("redis get: {err}")))?;
        match raw {
            None => Ok(None),
            Some(raw) => {
                let invoice = serde_json::from_str(&raw)
                    .map_err(|err| StoreError::new(format!("deserialize invoice: {err}")))?;
                Ok(Some(invoice))
            }
        }
    }

    async fn mark_used(&self, payment_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let now = gateway_types::Timestamp::now().to_string();
        let script = redis::Script::new(MARK_USED_SCRIPT);
        let result: i32 = script
            .key(key(payment_id))
            .arg(now)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| StoreError::new(format!("redis mark_used: {err}")))?;
        Ok(result == 1)
    }

    async fn delete(&self, payment_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key(payment_id))
            .await
            .map_err(|err| StoreError::new(format!("redis del: {err}")))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys("payment:*")
            .await
            .map_err(|err| StoreError::new(format!("redis keys: {err}")))?;
        let mut used = 0u64;
        let mut unused = 0u64;
        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|err| StoreError::new(format!("redis get: {err}")))?;
            if let Some(raw) = raw {
                if let Ok(invoice) = serde_json::from_str::<Invoice>(&raw) {
                    if invoice.used {
                        used += 1;
                    } else {
                        unused += 1;
                    }
                }
            }
        }
        Ok(StoreStats {
            total: used + unused,
            used,
            unused,
            backend: StoreBackend::Redis,
        })
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }
}
