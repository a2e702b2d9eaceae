//! End-to-end pipeline scenarios: challenge -> pay -> verify -> proxy.
//!
//! Exercises [`archivepay_gateway::pipeline::handle`] directly against an
//! [`AppState`] wired from test doubles (`FakeChainClient`,
//! `InMemoryInvoiceStore`, `wiremock` upstreams) rather than a bound
//! `TcpListener`, matching how the unit tests in `proxy.rs` already drive
//! `wiremock`.

use axum::extract::State;
use axum::http::HeaderMap;
use gateway_solana::testing::FakeChainClient;
use gateway_solana::{ChainClient, FacilitatorVerifier, PaymentVerifier};
use gateway_store::InMemoryInvoiceStore;
use gateway_types::address::Address;
use gateway_types::money::DEFAULT_MINT_DECIMALS;
use gateway_types::rpc::JsonRpcRequest;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use archivepay_gateway::notifier::SettlementNotifier;
use archivepay_gateway::pipeline::{self, AppState};
use archivepay_gateway::pricing::PricingTable;
use archivepay_gateway::proxy::UpstreamProxy;
use archivepay_gateway::registry::{Feature, ProviderRecord, ProviderRegistry, ProviderTier};

const MINT: &str = "11111111111111111111111111111112";
const RECIPIENT: &str = "11111111111111111111111111111113";
const VALID_SIGNATURE: &str = "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";

fn provider(id: &str, url: String) -> ProviderRecord {
    ProviderRecord {
        id: id.to_string(),
        name: id.to_string(),
        url,
        tier: ProviderTier::Public,
        price_multiplier: Decimal::ONE,
        reputation: Decimal::from(50),
        uptime: Decimal::from(99),
        latency_ms: Decimal::from(100),
        features: vec![Feature::Historical],
    }
}

fn state(chain: FakeChainClient, upstream_urls: &[String]) -> AppState {
    let registry = ProviderRegistry::new();
    for (idx, url) in upstream_urls.iter().enumerate() {
        registry.add(provider(&format!("p{idx}"), url.clone()));
    }

    let chain_client: Box<dyn ChainClient> = Box::new(chain);
    let verifier = PaymentVerifier::new(chain_client, FacilitatorVerifier::disabled());

    AppState {
        store: Arc::new(InMemoryInvoiceStore::new()),
        pricing: Arc::new(PricingTable::new(Decimal::from_str("0.0001").unwrap(), HashMap::new())),
        verifier: Arc::new(verifier),
        registry: Arc::new(registry),
        proxy: Arc::new(UpstreamProxy::new()),
        notifier: Arc::new(SettlementNotifier::disabled("solana")),
        mint: Address::new(MINT).unwrap(),
        recipient: Address::new(RECIPIENT).unwrap(),
        asset_symbol: "USDC".to_string(),
        chain_tag: "solana".to_string(),
        invoice_ttl_seconds: 900,
        mint_decimals: DEFAULT_MINT_DECIMALS,
    }
}

fn envelope(method: &str, params: Option<Value>) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: json!(1),
        method: method.to_string(),
        params,
    }
}

async fn call(state: &AppState, headers: HeaderMap, envelope: JsonRpcRequest) -> (axum::http::StatusCode, HeaderMap, Value) {
    let body = axum::body::Bytes::from(serde_json::to_vec(&envelope).unwrap());
    let response = pipeline::handle(State(state.clone()), headers, body).await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    (status, headers, value)
}

fn payment_header(tx_signature: &str, payment_id: Uuid) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let encoded = pipeline::encode_receipt(tx_signature, payment_id);
    headers.insert("x-payment", encoded.parse().unwrap());
    headers
}

async fn mock_upstream(result: Value) -> MockServer {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": result
        })))
        .mount(&mock)
        .await;
    mock
}

#[tokio::test]
async fn unpaid_request_is_challenged_then_paid_request_succeeds() {
    let upstream = mock_upstream(json!({"slot": 123})).await;
    // getSlot is priced at its 0.0001 base times the 0.8 real-time discount.
    let expected_amount = Decimal::from_str("0.00008").unwrap();
    let expected_base_units = gateway_solana::to_base_units(expected_amount, DEFAULT_MINT_DECIMALS).unwrap();
    let chain = FakeChainClient::new().with_transaction(
        VALID_SIGNATURE,
        FakeChainClient::confirmed_transfer(MINT, 0, expected_base_units),
    );
    let state = state(chain, &[upstream.uri()]);
    let req = envelope("getSlot", None);

    let (status, _, body) = call(&state, HeaderMap::new(), req.clone()).await;
    assert_eq!(status, axum::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_required");
    assert_eq!(body["accepts"][0]["amount"], "0.000080");
    let payment_id: Uuid = body["accepts"][0]["paymentId"].as_str().unwrap().parse().unwrap();

    let headers = payment_header(VALID_SIGNATURE, payment_id);
    let (status, headers_out, body) = call(&state, headers, req).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["result"]["slot"], 123);
    let receipt_header = headers_out.get("x-payment-response").unwrap().to_str().unwrap();
    let receipt: Value = gateway_types::b64::decode(receipt_header).unwrap();
    assert_eq!(receipt["txSignature"], VALID_SIGNATURE);
    assert_eq!(receipt["paymentId"], payment_id.to_string());
    assert_eq!(receipt["settled"], true);
}

#[tokio::test]
async fn replaying_a_consumed_payment_id_is_rejected() {
    let upstream = mock_upstream(json!({"slot": 1})).await;
    let payment_id = Uuid::new_v4();
    let amount = Decimal::from_str("0.0001").unwrap();
    let expected_base_units = gateway_solana::to_base_units(amount, DEFAULT_MINT_DECIMALS).unwrap();

    let chain = FakeChainClient::new().with_transaction(
        VALID_SIGNATURE,
        FakeChainClient::confirmed_transfer(MINT, 0, expected_base_units),
    );
    let state = state(chain, &[upstream.uri()]);
    let invoice = gateway_types::invoice::Invoice::new(
        payment_id,
        amount,
        Address::new(MINT).unwrap(),
        Address::new(RECIPIENT).unwrap(),
        "getSlot".to_string(),
        900,
    );
    state.store.create(invoice).await.unwrap();

    let req = envelope("getSlot", None);
    let headers = payment_header(VALID_SIGNATURE, payment_id);
    let (status, _, _) = call(&state, headers.clone(), req.clone()).await;
    assert_eq!(status, axum::http::StatusCode::OK);

    let (status, _, body) = call(&state, headers, req).await;
    assert_eq!(status, axum::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_already_used");
}

#[tokio::test]
async fn deep_historical_get_block_is_priced_higher_than_default() {
    let upstream = mock_upstream(json!({"blockhash": "H"})).await;
    let state = state(FakeChainClient::new(), &[upstream.uri()]);
    let req = envelope("getBlock", Some(json!([50_000])));

    let (_, _, body) = call(&state, HeaderMap::new(), req).await;
    assert_eq!(body["accepts"][0]["amount"], "0.001500");
}

#[tokio::test]
async fn payment_with_the_wrong_mint_is_rejected() {
    let upstream = mock_upstream(json!({"slot": 1})).await;
    let payment_id = Uuid::new_v4();
    let amount = Decimal::from_str("0.0001").unwrap();
    let expected_base_units = gateway_solana::to_base_units(amount, DEFAULT_MINT_DECIMALS).unwrap();

    let chain = FakeChainClient::new().with_transaction(
        VALID_SIGNATURE,
        FakeChainClient::confirmed_transfer("WrongMint11111111111111111111111", 0, expected_base_units),
    );
    let state = state(chain, &[upstream.uri()]);
    let invoice = gateway_types::invoice::Invoice::new(
        payment_id,
        amount,
        Address::new(MINT).unwrap(),
        Address::new(RECIPIENT).unwrap(),
        "getSlot".to_string(),
        900,
    );
    state.store.create(invoice).await.unwrap();

    let req = envelope("getSlot", None);
    let headers = payment_header(VALID_SIGNATURE, payment_id);
    let (status, _, body) = call(&state, headers, req).await;
    assert_eq!(status, axum::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_invalid");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("wrong mint"));
    assert!(details.contains("WrongMint11111111111111111111111"));
    assert!(details.contains(MINT));
}

#[tokio::test]
async fn upstream_failover_serves_the_healthy_provider() {
    let down = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&down)
        .await;
    let healthy = mock_upstream(json!({"slot": 7})).await;

    let payment_id = Uuid::new_v4();
    let amount = Decimal::from_str("0.0001").unwrap();
    let expected_base_units = gateway_solana::to_base_units(amount, DEFAULT_MINT_DECIMALS).unwrap();
    let chain = FakeChainClient::new().with_transaction(
        VALID_SIGNATURE,
        FakeChainClient::confirmed_transfer(MINT, 0, expected_base_units),
    );
    let state = state(chain, &[down.uri(), healthy.uri()]);
    let invoice = gateway_types::invoice::Invoice::new(
        payment_id,
        amount,
        Address::new(MINT).unwrap(),
        Address::new(RECIPIENT).unwrap(),
        "getSlot".to_string(),
        900,
    );
    state.store.create(invoice).await.unwrap();

    let req = envelope("getSlot", None);
    let headers = payment_header(VALID_SIGNATURE, payment_id);
    let (status, _, body) = call(&state, headers, req).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["result"]["slot"], 7);
}

#[tokio::test]
async fn all_upstreams_down_still_returns_200_with_an_error_envelope() {
    let down_a = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&down_a).await;
    let down_b = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&down_b).await;

    let payment_id = Uuid::new_v4();
    let amount = Decimal::from_str("0.0001").unwrap();
    let expected_base_units = gateway_solana::to_base_units(amount, DEFAULT_MINT_DECIMALS).unwrap();
    let chain = FakeChainClient::new().with_transaction(
        VALID_SIGNATURE,
        FakeChainClient::confirmed_transfer(MINT, 0, expected_base_units),
    );
    let state = state(chain, &[down_a.uri(), down_b.uri()]);
    let invoice = gateway_types::invoice::Invoice::new(
        payment_id,
        amount,
        Address::new(MINT).unwrap(),
        Address::new(RECIPIENT).unwrap(),
        "getSlot".to_string(),
        900,
    );
    state.store.create(invoice).await.unwrap();

    let req = envelope("getSlot", None);
    let headers = payment_header(VALID_SIGNATURE, payment_id);
    let (status, _, body) = call(&state, headers, req).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["error"]["code"], -32603);
}

#[tokio::test]
async fn malformed_json_body_is_rejected_as_a_json_rpc_protocol_error() {
    let upstream = mock_upstream(json!({"slot": 1})).await;
    let state = state(FakeChainClient::new(), &[upstream.uri()]);

    let body = axum::body::Bytes::from_static(b"{ not json");
    let response = pipeline::handle(State(state.clone()), HeaderMap::new(), body).await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"]["code"], -32600);
}

#[tokio::test]
async fn envelope_missing_method_is_rejected_as_a_json_rpc_protocol_error() {
    let upstream = mock_upstream(json!({"slot": 1})).await;
    let state = state(FakeChainClient::new(), &[upstream.uri()]);

    let body = axum::body::Bytes::from(serde_json::to_vec(&json!({"jsonrpc": "2.0", "id": 7})).unwrap());
    let response = pipeline::handle(State(state.clone()), HeaderMap::new(), body).await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"]["code"], -32600);
    assert_eq!(value["id"], 7);
}
