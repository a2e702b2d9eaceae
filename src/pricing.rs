//! Pricing policy: `(method, params) -> amount`, `spec.md` §4.2.
//!
//! A pure, deterministic function over a small immutable table. Constructed
//! once at startup from the default table plus `price_<METHOD>` /
//! `price_per_query` overrides, then wrapped in an `Arc` and never mutated —
//! the "pricing table is effectively immutable after startup" resource rule
//! from `spec.md` §5.

use gateway_types::rpc::JsonRpcRequest;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

const DEEP_HISTORICAL_MULTIPLIER: &str = "1.5";
const BULK_QUERY_MULTIPLIER: &str = "1.3";
const REAL_TIME_MULTIPLIER: &str = "0.8";
const DEEP_HISTORICAL_SLOT_CEILING: i64 = 100_000;
const BULK_QUERY_LIMIT_THRESHOLD: u64 = 10;

fn default_base_prices() -> HashMap<String, Decimal> {
    let mut table = HashMap::new();
    table.insert("getBlock".to_string(), Decimal::from_str("0.001").unwrap());
    table.insert("getTransaction".to_string(), Decimal::from_str("0.001").unwrap());
    table.insert(
        "getSignaturesForAddress".to_string(),
        Decimal::from_str("0.0005").unwrap(),
    );
    table.insert("getSlot".to_string(), Decimal::from_str("0.0001").unwrap());
    table.insert("getBlockHeight".to_string(), Decimal::from_str("0.0001").unwrap());
    table
}

/// Base prices per method, plus the fallback used for unlisted methods.
/// Immutable after construction; safe to share behind an `Arc` across
/// concurrently-handled requests.
#[derive(Debug, Clone)]
pub struct PricingTable {
    base_prices: HashMap<String, Decimal>,
    default_price: Decimal,
}

impl PricingTable {
    /// `overrides`: `price_<METHOD>` config keys, method names already
    /// normalized to match the wire method name exactly.
    pub fn new(default_price: Decimal, overrides: HashMap<String, Decimal>) -> Self {
        let mut base_prices = default_base_prices();
        base_prices.extend(overrides);
        PricingTable {
            base_prices,
            default_price,
        }
    }

    fn base_price(&self, method: &str) -> Decimal {
        self.base_prices
            .get(method)
            .copied()
            .unwrap_or(self.default_price)
    }

    /// Prices a single JSON-RPC request. Deterministic: the same
    /// `(method, params)` always yields the same amount. Exactly one
    /// multiplier applies, per `spec.md` §4.2.
    pub fn price(&self, request: &JsonRpcRequest) -> Decimal {
        let base = self.base_price(&request.method);
        let multiplier = self.multiplier_for(request);
        gateway_types::money::round_price(base * multiplier)
    }

    fn multiplier_for(&self, request: &JsonRpcRequest) -> Decimal {
        if is_deep_historical(request) {
            return Decimal::from_str(DEEP_HISTORICAL_MULTIPLIER).unwrap();
        }
        if is_bulk_query(request) {
            return Decimal::from_str(BULK_QUERY_MULTIPLIER).unwrap();
        }
        if is_real_time(request) {
            return Decimal::from_str(REAL_TIME_MULTIPLIER).unwrap();
        }
        Decimal::ONE
    }
}

fn is_deep_historical(request: &JsonRpcRequest) -> bool {
    matches!(request.method.as_str(), "getBlock" | "getTransaction")
        && request
            .first_param()
            .and_then(|v| v.as_i64())
            .is_some_and(|slot| slot < DEEP_HISTORICAL_SLOT_CEILING)
}

fn is_bulk_query(request: &JsonRpcRequest) -> bool {
    request.method == "getSignaturesForAddress"
        && request
            .option("limit")
            .and_then(|v| v.as_u64())
            .is_some_and(|limit| limit > BULK_QUERY_LIMIT_THRESHOLD)
}

fn is_real_time(request: &JsonRpcRequest) -> bool {
    matches!(request.method.as_str(), "getSlot" | "getBlockHeight")
}

/// Derives `requireHistorical` from the method name, per `spec.md` §4.4.
pub fn requires_historical(method: &str) -> bool {
    matches!(
        method,
        "getBlock" | "getTransaction" | "getSignaturesForAddress"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Value::from(1),
            method: method.to_string(),
            params,
        }
    }

    fn table() -> PricingTable {
        PricingTable::new(Decimal::from_str("0.0001").unwrap(), HashMap::new())
    }

    #[test]
    fn deep_historical_block_is_priced_at_1_5x() {
        let req = request("getBlock", Some(json!([50_000])));
        assert_eq!(table().price(&req).to_string(), "0.001500");
    }

    #[test]
    fn block_at_slot_100000_is_not_deep_historical() {
        let req = request("getBlock", Some(json!([100_000])));
        assert_eq!(table().price(&req).to_string(), "0.001000");
    }

    #[test]
    fn bulk_query_requires_limit_over_10() {
        let not_bulk = request("getSignaturesForAddress", Some(json!([{"limit": 10}])));
        let bulk = request("getSignaturesForAddress", Some(json!([{"limit": 11}])));
        assert_eq!(table().price(&not_bulk).to_string(), "0.000500");
        assert_eq!(table().price(&bulk).to_string(), "0.000650");
    }

    #[test]
    fn real_time_methods_get_discount() {
        let req = request("getSlot", None);
        assert_eq!(table().price(&req).to_string(), "0.000080");
    }

    #[test]
    fn unknown_method_falls_back_to_default_price() {
        let req = request("getAccountInfo", None);
        assert_eq!(table().price(&req), Decimal::from_str("0.0001").unwrap());
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("getBlock".to_string(), Decimal::from_str("0.01").unwrap());
        let table = PricingTable::new(Decimal::from_str("0.0001").unwrap(), overrides);
        let req = request("getBlock", Some(json!([999_999])));
        assert_eq!(table.price(&req).to_string(), "0.010000");
    }

    #[test]
    fn pricing_is_deterministic() {
        let req = request("getBlock", Some(json!([50_000])));
        assert_eq!(table().price(&req), table().price(&req));
    }
}
