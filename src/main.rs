//! archivepay-gateway HTTP entrypoint.
//!
//! Launches the pay-per-query JSON-RPC gateway: a single `POST /` route
//! that prices an inbound JSON-RPC call, challenges for an SPL-token
//! micropayment, verifies the settled transfer on-chain, and proxies the
//! call to the best available upstream archive provider.
//!
//! Environment: `.env` loaded at startup; every key in `spec.md` §6's
//! configuration table is settable via CLI flag or environment variable
//! (see [`archivepay_gateway::config`]).

use axum::Router;
use axum::routing::post;
use gateway_solana::{ChainClient, FacilitatorVerifier, PaymentVerifier, SolanaChainClient};
use gateway_store::FallbackInvoiceStore;
use gateway_types::address::Address;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use archivepay_gateway::config::Config;
use archivepay_gateway::notifier::SettlementNotifier;
use archivepay_gateway::pipeline::{self, AppState};
use archivepay_gateway::pricing::PricingTable;
use archivepay_gateway::proxy::UpstreamProxy;
use archivepay_gateway::registry::{Feature, ProviderRecord, ProviderRegistry, ProviderTier};
use archivepay_gateway::sig_down::SigDown;

const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
const CHAIN_TAG: &str = "solana";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;

    let recipient = Address::new(config.payment_wallet_address.clone())?;
    let mint = Address::new(config.billing_mint.clone())?;

    let store = FallbackInvoiceStore::connect(&config.invoice_store_url).await;
    let store = Arc::new(store);

    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();
    let sweep_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => sweep_store.sweep_expired(),
                _ = cancellation_token.cancelled() => break,
            }
        }
    });

    let registry = Arc::new(build_registry(&config));

    let chain_client: Box<dyn ChainClient> = Box::new(SolanaChainClient::new(config.chain_rpc_url.clone()));
    let facilitator = FacilitatorVerifier::new(config.facilitator_verify_url.clone());
    let verifier = Arc::new(PaymentVerifier::new(chain_client, facilitator));

    let notifier = Arc::new(SettlementNotifier::new(
        config.facilitator_settle_url.clone(),
        CHAIN_TAG,
    ));

    let pricing = Arc::new(PricingTable::new(config.price_per_query, config.price_overrides.clone()));

    let state = AppState {
        store,
        pricing,
        verifier,
        registry,
        proxy: Arc::new(UpstreamProxy::new()),
        notifier,
        mint,
        recipient,
        asset_symbol: "USDC".to_string(),
        chain_tag: CHAIN_TAG.to_string(),
        invoice_ttl_seconds: config.invoice_ttl_seconds,
        mint_decimals: gateway_types::money::DEFAULT_MINT_DECIMALS,
    };

    let app = Router::new()
        .route("/", post(pipeline::handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    // CORS and rate limiting are installed by the surrounding system, not
    // the core: `spec.md` §1 names both as external collaborators. Add
    // `.layer(...)` here when wiring this router into that system.

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "starting archivepay-gateway");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_token = sig_down.cancellation_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;

    Ok(())
}

fn build_registry(config: &Config) -> ProviderRegistry {
    let registry = ProviderRegistry::new();
    registry.add(ProviderRecord {
        id: "default".to_string(),
        name: "default upstream".to_string(),
        url: config.upstream_default_url.clone(),
        tier: ProviderTier::Premium,
        price_multiplier: "1.0".parse().unwrap(),
        reputation: "90".parse().unwrap(),
        uptime: "99".parse().unwrap(),
        latency_ms: "150".parse().unwrap(),
        features: vec![Feature::Historical],
    });

    if config.use_fallback {
        if let Some(url) = &config.upstream_fallback_url {
            registry.add(ProviderRecord {
                id: "fallback".to_string(),
                name: "fallback upstream".to_string(),
                url: url.clone(),
                tier: ProviderTier::Public,
                price_multiplier: "1.0".parse().unwrap(),
                reputation: "70".parse().unwrap(),
                uptime: "95".parse().unwrap(),
                latency_ms: "250".parse().unwrap(),
                features: vec![Feature::Historical],
            });
        }
    }

    for provider in &config.extra_providers {
        registry.add(provider.clone());
    }

    registry
}
