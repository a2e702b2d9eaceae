//! Provider registry, scoring, and selection — `spec.md` §4.4.
//!
//! Grounded on the teacher's `ChainRegistry<P>`
//! (`crates/x402-types/src/chain/mod.rs`): an append-only collection keyed
//! by a stable id, generalized from "one provider per chain id" to "many
//! ranked providers for the one configured chain." Reads dominate writes
//! (selection runs per request; health updates and additions are rare), so
//! health lives in a `DashMap` read-rarely-written-often alongside an
//! append-only `Vec` of the immutable provider records themselves.

use dashmap::DashMap;
use gateway_types::Timestamp;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Once a provider's `consecutive_failures` exceeds this, it is excluded
/// from normal selection until a success resets the counter.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Premium,
    Public,
    Community,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    Historical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub tier: ProviderTier,
    pub price_multiplier: Decimal,
    pub reputation: Decimal,
    pub uptime: Decimal,
    pub latency_ms: Decimal,
    pub features: Vec<Feature>,
}

impl ProviderRecord {
    pub fn supports_historical(&self) -> bool {
        self.features.contains(&Feature::Historical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub last_check: Timestamp,
    pub consecutive_failures: u32,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        ProviderHealth {
            status: HealthStatus::Unknown,
            last_check: Timestamp::now(),
            consecutive_failures: 0,
        }
    }
}

impl ProviderHealth {
    fn is_selectable(&self) -> bool {
        self.consecutive_failures <= MAX_CONSECUTIVE_FAILURES
    }
}

/// Scoring formula selected by the caller's preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategy {
    Balanced,
    Cheapest,
}

#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    pub require_historical: bool,
    pub strategy: ScoringStrategy,
}

/// Holds an ordered set of upstream providers plus their health. Additions
/// are serialized against the snapshot used by in-flight selection via the
/// `RwLock` around the provider list, so a caller never observes a partial
/// record; health updates use `DashMap`'s per-entry locking since they are
/// far more frequent and independent across providers.
pub struct ProviderRegistry {
    providers: RwLock<Vec<ProviderRecord>>,
    health: DashMap<String, ProviderHealth>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: RwLock::new(Vec::new()),
            health: DashMap::new(),
        }
    }

    /// Adds a provider at runtime. It enters the pool immediately with
    /// `status: unknown`.
    pub fn add(&self, provider: ProviderRecord) {
        let id = provider.id.clone();
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .push(provider);
        self.health.entry(id).or_default();
    }

    pub fn providers(&self) -> Vec<ProviderRecord> {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .clone()
    }

    pub fn health_of(&self, id: &str) -> ProviderHealth {
        self.health.entry(id.to_string()).or_default().clone()
    }

    /// Records a successful forwarded call: resets the failure streak.
    pub fn record_success(&self, id: &str) {
        let mut entry = self.health.entry(id.to_string()).or_default();
        entry.status = HealthStatus::Healthy;
        entry.consecutive_failures = 0;
        entry.last_check = Timestamp::now();
    }

    /// Records a failed forwarded call: increments the failure streak.
    pub fn record_failure(&self, id: &str) {
        let mut entry = self.health.entry(id.to_string()).or_default();
        entry.status = HealthStatus::Unhealthy;
        entry.consecutive_failures += 1;
        entry.last_check = Timestamp::now();
    }

    /// Picks a provider for the given criteria, in registry insertion
    /// order for tie-breaking. Returns `None` only when the registry holds
    /// no providers at all.
    pub fn select(&self, criteria: &SelectionCriteria) -> Option<ProviderRecord> {
        let providers = self.providers();
        if providers.is_empty() {
            return None;
        }

        let mut candidates: Vec<&ProviderRecord> = providers
            .iter()
            .filter(|p| self.health_of(&p.id).is_selectable())
            .filter(|p| !criteria.require_historical || p.supports_historical())
            .collect();

        if candidates.is_empty() {
            tracing::warn!("provider selection: no healthy candidates, relaxing health filter (degraded)");
            candidates = providers.iter().collect();
        }

        candidates
            .into_iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                let score_a = self.score(a, criteria.strategy);
                let score_b = self.score(b, criteria.strategy);
                score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(_, provider)| provider.clone())
    }

    /// Ordered candidates for failover, excluding `exclude_id`, in registry
    /// insertion order.
    pub fn failover_candidates(&self, exclude_id: &str) -> Vec<ProviderRecord> {
        self.providers()
            .into_iter()
            .filter(|p| p.id != exclude_id)
            .collect()
    }

    fn score(&self, provider: &ProviderRecord, strategy: ScoringStrategy) -> f64 {
        let reputation = to_f64(provider.reputation);
        let uptime = to_f64(provider.uptime);
        let price_multiplier = to_f64(provider.price_multiplier);
        let latency = to_f64(provider.latency_ms);

        match strategy {
            ScoringStrategy::Balanced => {
                reputation * 0.4 + uptime * 0.3 + (1.0 - price_multiplier) * 0.2
                    + (1.0 - latency / 500.0) * 0.1
            }
            ScoringStrategy::Cheapest => {
                (1.0 - price_multiplier) * 0.5 + reputation * 0.3 + uptime * 0.2
            }
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        ProviderRegistry::new()
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Derives `requireHistorical` from the method name, per `spec.md` §4.4.
pub fn requires_historical(method: &str) -> bool {
    crate::pricing::requires_historical(method)
}
