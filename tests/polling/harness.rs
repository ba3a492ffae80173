//! In-memory gateway and wallet used by the polling scenarios.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use truthguard::client::{HttpRequest, HttpResponse, Transport};
use truthguard::submit::{Permission, SignedTransaction, UnsignedTransaction};
use truthguard::{
    ClientConfig, Error, FactChecker, FactCheckerBuilder, PollEvent, PollEventsChannel, Result,
    WalletProvider,
};

/// Result written by the fake agent.
#[derive(Debug, Clone)]
struct Published {
    tx_id: String,
    visible_after: u32,
    payload: String,
}

/// Gateway that serves results once enough queries have been made.
#[derive(Default)]
pub struct FakeGateway {
    results: Mutex<HashMap<String, Published>>,
    uploads: Mutex<Vec<serde_json::Value>>,
    queries: AtomicU32,
    fetches: AtomicU32,
    offline: Mutex<bool>,
}

impl FakeGateway {
    /// Create an empty gateway.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish `payload` as the result of `request_id`, visible from the
    /// `visible_after`-th query on.
    pub fn publish(&self, request_id: &str, tx_id: &str, visible_after: u32, payload: &str) {
        self.results.lock().insert(
            request_id.to_string(),
            Published {
                tx_id: tx_id.to_string(),
                visible_after,
                payload: payload.to_string(),
            },
        );
    }

    /// Fail every request with a transport error.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// GraphQL queries answered so far.
    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Payload fetches answered so far.
    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Transactions uploaded so far.
    pub fn uploads(&self) -> Vec<serde_json::Value> {
        self.uploads.lock().clone()
    }

    fn answer_query(&self, body: &[u8]) -> HttpResponse {
        let count = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        let request: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
        let related = request["variables"]["tags"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|tag| tag["name"] == "Related-Request")
            .and_then(|tag| tag["values"][0].as_str())
            .map(str::to_string);

        let edges = related
            .and_then(|id| self.results.lock().get(&id).cloned())
            .filter(|published| count >= published.visible_after)
            .map(|published| {
                vec![serde_json::json!({
                    "node": {
                        "id": published.tx_id,
                        "tags": [{ "name": "Type", "value": "FactCheckResult" }]
                    }
                })]
            })
            .unwrap_or_default();

        HttpResponse::json(&serde_json::json!({
            "data": { "transactions": { "edges": edges } }
        }))
    }

    fn answer_fetch(&self, tx_id: &str) -> HttpResponse {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .values()
            .find(|published| published.tx_id == tx_id)
            .map_or_else(
                || HttpResponse::new(404, Some("text/plain"), "Not Found"),
                |published| {
                    HttpResponse::new(200, Some("text/plain"), published.payload.clone())
                },
            )
    }
}

#[async_trait]
impl Transport for FakeGateway {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        if *self.offline.lock() {
            return Err(Error::TransientNetworkFailure("connection refused".into()));
        }

        let path = request
            .url
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map_or("", |(_, path)| path);
        let body = request.body.as_deref().unwrap_or_default();

        Ok(match (request.method.as_str(), path) {
            ("POST", "graphql") => self.answer_query(body),
            ("POST", "tx") => {
                let upload = serde_json::from_slice(body).unwrap_or_default();
                self.uploads.lock().push(upload);
                HttpResponse::new(200, Some("text/plain"), "OK")
            }
            ("GET", tx_id) => self.answer_fetch(tx_id),
            _ => HttpResponse::new(400, Some("text/plain"), "Bad Request"),
        })
    }
}

/// Wallet that signs every transaction with its payload bytes.
pub struct FakeWallet {
    /// Refuse the connection request.
    pub reject: bool,
}

impl FakeWallet {
    /// Id the wallet assigns to a claim with `content`.
    pub fn id_for(content: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(content.as_bytes()))
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn connect(&self, _permissions: &[Permission]) -> Result<()> {
        if self.reject {
            return Err(Error::WalletUnavailable("user rejected the request".into()));
        }
        Ok(())
    }

    async fn active_address(&self) -> Result<String> {
        Ok("fake-owner".into())
    }

    async fn sign(&self, transaction: UnsignedTransaction) -> Result<SignedTransaction> {
        let signature = URL_SAFE_NO_PAD.encode(&transaction.data);
        let id = URL_SAFE_NO_PAD.encode(Sha256::digest(&transaction.data));
        let tags: Vec<_> = transaction
            .tags
            .iter()
            .map(|tag| serde_json::json!({ "name": tag.name, "value": tag.value }))
            .collect();
        Ok(SignedTransaction {
            id: id.clone(),
            signature: signature.clone(),
            payload: serde_json::json!({
                "id": id,
                "owner": transaction.owner_address,
                "signature": signature,
                "tags": tags,
            }),
        })
    }
}

/// A checker wired to a [`FakeGateway`].
pub struct TestHarness {
    /// The gateway behind every endpoint.
    pub gateway: Arc<FakeGateway>,
    /// The checker under test.
    pub checker: FactChecker,
    /// Events published by the checker.
    pub events: PollEventsChannel,
}

impl TestHarness {
    /// Default configuration with fast retries.
    pub fn config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.retry.max_attempts = 1;
        config.retry.base_delay_ms = 10;
        config
    }

    /// Set up with [`TestHarness::config`].
    pub fn setup() -> Self {
        Self::setup_with_config(Self::config())
    }

    /// Set up with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn setup_with_config(config: ClientConfig) -> Self {
        let gateway = FakeGateway::new();
        let checker = FactCheckerBuilder::new(config)
            .with_transport(gateway.clone())
            .build()
            .unwrap_or_else(|e| panic!("failed to build checker: {e}"));
        let events = checker.subscribe_events();
        Self {
            gateway,
            checker,
            events,
        }
    }

    /// Collect events until a terminal one arrives.
    pub async fn events_until_terminal(&mut self) -> Vec<PollEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.recv().await {
            let done = event.is_terminal() || matches!(event, PollEvent::Cancelled { .. });
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    }
}
