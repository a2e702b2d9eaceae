//! Gateway configuration — `spec.md` §6.
//!
//! Grounded on `facilitator/src/config.rs`'s layering: a `clap::Parser` CLI
//! struct with `env = "..."` on every flat field (so every key in the
//! config table is settable by env var or flag), plus an optional JSON
//! config file for the handful of keys that don't fit a flat CLI surface
//! (`price_<METHOD>` overrides, extra provider records). `dotenvy::dotenv()`
//! is loaded once before parsing, exactly as the teacher's `run()` does.

use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::registry::ProviderRecord;

#[derive(Parser, Debug, Clone)]
#[command(name = "archivepay-gateway")]
#[command(about = "Pay-per-query HTTP gateway fronting a Solana JSON-RPC archive")]
pub struct CliArgs {
    #[arg(long, env = "PORT", default_value_t = 8402)]
    pub port: u16,

    #[arg(long, env = "PAYMENT_WALLET_ADDRESS")]
    pub payment_wallet_address: String,

    #[arg(long, env = "PRICE_PER_QUERY", default_value = "0.0001")]
    pub price_per_query: String,

    #[arg(long, env = "BILLING_MINT")]
    pub billing_mint: String,

    #[arg(long, env = "CHAIN_RPC_URL")]
    pub chain_rpc_url: String,

    #[arg(long, env = "UPSTREAM_DEFAULT_URL")]
    pub upstream_default_url: String,

    #[arg(long, env = "UPSTREAM_FALLBACK_URL")]
    pub upstream_fallback_url: Option<String>,

    #[arg(long, env = "USE_FALLBACK", default_value_t = false)]
    pub use_fallback: bool,

    #[arg(long, env = "FACILITATOR_VERIFY_URL")]
    pub facilitator_verify_url: Option<String>,

    #[arg(long, env = "FACILITATOR_SETTLE_URL")]
    pub facilitator_settle_url: Option<String>,

    #[arg(long, env = "INVOICE_STORE_URL", default_value = "")]
    pub invoice_store_url: String,

    #[arg(long, env = "INVOICE_TTL_SECONDS", default_value_t = 900)]
    pub invoice_ttl_seconds: u64,

    /// Consumed by the surrounding rate-limit collaborator, not the core.
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS", default_value_t = 60_000)]
    pub rate_limit_window_ms: u64,

    /// Consumed by the surrounding rate-limit collaborator, not the core.
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 100)]
    pub rate_limit_max: u64,

    /// Optional JSON file layering `price_<METHOD>` overrides and extra
    /// provider records under the flat CLI/env surface above.
    #[arg(long, env = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// The `--config`/`CONFIG` JSON file shape: fields a flat CLI surface can't
/// express cleanly.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    price_overrides: HashMap<String, String>,
    #[serde(default)]
    providers: Vec<ProviderRecord>,
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub payment_wallet_address: String,
    pub price_per_query: Decimal,
    pub price_overrides: HashMap<String, Decimal>,
    pub billing_mint: String,
    pub chain_rpc_url: String,
    pub upstream_default_url: String,
    pub upstream_fallback_url: Option<String>,
    pub use_fallback: bool,
    pub facilitator_verify_url: Option<String>,
    pub facilitator_settle_url: Option<String>,
    pub invoice_store_url: String,
    pub invoice_ttl_seconds: u64,
    pub extra_providers: Vec<ProviderRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid price_per_query: {0}")]
    InvalidPrice(String),
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid price override for {method}: {value}")]
    InvalidOverride { method: String, value: String },
}

impl Config {
    /// Loads `.env`, parses CLI args/env vars, and layers an optional JSON
    /// config file under them. `price_<METHOD>` overrides may also come
    /// from bare environment variables (scanned after `dotenvy::dotenv()`),
    /// since clap's derive API cannot bind a dynamic set of field names.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let cli = CliArgs::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let price_per_query = Decimal::from_str(&cli.price_per_query)
            .map_err(|_| ConfigError::InvalidPrice(cli.price_per_query.clone()))?;

        let mut price_overrides = HashMap::new();
        let mut extra_providers = Vec::new();

        if let Some(path) = &cli.config {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
                path: path.clone(),
                source,
            })?;
            let file: ConfigFile = serde_json::from_str(&contents).map_err(|source| ConfigError::ParseFile {
                path: path.clone(),
                source,
            })?;
            for (method, value) in file.price_overrides {
                let parsed = Decimal::from_str(&value).map_err(|_| ConfigError::InvalidOverride {
                    method: method.clone(),
                    value: value.clone(),
                })?;
                price_overrides.insert(method, parsed);
            }
            extra_providers = file.providers;
        }

        for (method, value) in price_overrides_from_env() {
            let parsed = Decimal::from_str(&value)
                .map_err(|_| ConfigError::InvalidOverride { method: method.clone(), value })?;
            price_overrides.insert(method, parsed);
        }

        Ok(Config {
            port: cli.port,
            payment_wallet_address: cli.payment_wallet_address,
            price_per_query,
            price_overrides,
            billing_mint: cli.billing_mint,
            chain_rpc_url: cli.chain_rpc_url,
            upstream_default_url: cli.upstream_default_url,
            upstream_fallback_url: cli.upstream_fallback_url,
            use_fallback: cli.use_fallback,
            facilitator_verify_url: cli.facilitator_verify_url,
            facilitator_settle_url: cli.facilitator_settle_url,
            invoice_store_url: cli.invoice_store_url,
            invoice_ttl_seconds: cli.invoice_ttl_seconds,
            extra_providers,
        })
    }
}

/// Scans `PRICE_<METHOD>` environment variables (excluding `PRICE_PER_QUERY`,
/// which has its own flag) and maps them back to the wire method name by
/// lower-camel-casing the suffix, e.g. `PRICE_GETBLOCK` only matches a
/// method spelled `getblock`; mixed-case RPC method names are expected to
/// be configured via the JSON file's `price_overrides` instead.
fn price_overrides_from_env() -> Vec<(String, String)> {
    std::env::vars()
        .filter_map(|(key, value)| {
            let suffix = key.strip_prefix("PRICE_")?;
            if suffix == "PER_QUERY" {
                return None;
            }
            Some((suffix.to_lowercase(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliArgs {
        CliArgs {
            port: 8402,
            payment_wallet_address: "11111111111111111111111111111111".to_string(),
            price_per_query: "0.0001".to_string(),
            billing_mint: "MintA".to_string(),
            chain_rpc_url: "https://rpc.example".to_string(),
            upstream_default_url: "https://upstream.example".to_string(),
            upstream_fallback_url: None,
            use_fallback: false,
            facilitator_verify_url: None,
            facilitator_settle_url: None,
            invoice_store_url: String::new(),
            invoice_ttl_seconds: 900,
            rate_limit_window_ms: 60_000,
            rate_limit_max: 100,
            config: None,
        }
    }

    #[test]
    fn resolves_default_price() {
        let config = Config::from_cli(cli()).unwrap();
        assert_eq!(config.price_per_query, Decimal::from_str("0.0001").unwrap());
    }

    #[test]
    fn rejects_malformed_price() {
        let mut args = cli();
        args.price_per_query = "not-a-number".to_string();
        assert!(Config::from_cli(args).is_err());
    }
}
