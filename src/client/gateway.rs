//! Multi-endpoint gateway client for result discovery and retrieval.
//!
//! ## Lookup flow
//!
//! ```text
//! find_result_tx(request_id)
//!     │
//!     ▼
//! ┌──────────────────────┐  failed (transport, status,
//! │ endpoint[i]/graphql  │──content type, errors) ──► i + 1
//! └──────────┬───────────┘
//!            │ answered
//!      ┌─────┴─────┐
//!      │           │
//!   0 edges    ≥1 edges
//!      │           │
//!      ▼           ▼
//!    None     Some(first id) ──► fetch_result(id)
//! ```
//!
//! Endpoints are tried strictly in configured order and the first endpoint
//! that answers decides. An empty answer is final: it means "no result yet",
//! not "try another gateway". When several result transactions match, the
//! first in the gateway's order is taken; nothing guarantees the agent wrote
//! only one.
//!
//! Payload fetches fall through the same endpoint list. A gateway that answers
//! with a non-success status (typically 404 while the payload propagates)
//! counts as having answered: if no endpoint serves the payload but at least
//! one answered, the result is "no result yet". [`Error::AllEndpointsFailed`]
//! is kept for the case where every endpoint was unreachable.

use super::cache::ResultCache;
use super::data_types::{RequestId, ResultRecord, ResultTxId};
use super::query::{GraphQlResponse, TransactionQuery};
use super::retry::{send_with_retry, RetryPolicy};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::ResultLookup;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lookup statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryStats {
    /// Result queries issued.
    pub queries: u64,
    /// Queries that found a result transaction.
    pub hits: u64,
    /// Queries answered with no match.
    pub misses: u64,
    /// Individual endpoint failures, across queries and fetches.
    pub endpoint_failures: u64,
    /// Payloads that could not be decoded.
    pub malformed: u64,
}

/// Client for a prioritised list of redundant gateways.
pub struct GatewayClient {
    endpoints: Vec<String>,
    app_name: String,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    cache: ResultCache,
    stats: RwLock<QueryStats>,
}

impl GatewayClient {
    /// Create a client that talks to the configured gateways over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let timeout = config.gateway.request_timeout_secs.map(Duration::from_secs);
        let transport = Arc::new(ReqwestTransport::new(timeout)?);
        Self::with_transport(config, transport)
    }

    /// Create a client over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let endpoints = config
            .gateway
            .endpoints
            .iter()
            .map(|e| e.trim_end_matches('/').to_string())
            .collect::<Vec<_>>();

        info!(
            "Gateway client ready ({} endpoints, app={})",
            endpoints.len(),
            config.gateway.app_name
        );

        Ok(Self {
            endpoints,
            app_name: config.gateway.app_name.clone(),
            retry: RetryPolicy::from(&config.retry),
            transport,
            cache: ResultCache::with_capacity(config.gateway.cache_capacity),
            stats: RwLock::new(QueryStats::default()),
        })
    }

    /// Gateway base URLs in priority order.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The transport shared with other gateway users.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// The retry policy applied to every request.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Find the result transaction written for `request_id`.
    ///
    /// Returns `Ok(None)` as soon as one endpoint answers with no match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if the query cannot be built, or
    /// [`Error::AllEndpointsFailed`] if no endpoint produced an answer.
    pub async fn find_result_tx(&self, request_id: &RequestId) -> Result<Option<ResultTxId>> {
        let query = TransactionQuery::results_for(&self.app_name, request_id)?;
        self.stats.write().queries += 1;

        for endpoint in &self.endpoints {
            let url = format!("{endpoint}/graphql");
            let request = HttpRequest::post_json(url.as_str(), &query.to_request())?;

            let ids = match self.query_endpoint(&request).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Result query for {request_id} failed on {endpoint}: {e}");
                    self.stats.write().endpoint_failures += 1;
                    continue;
                }
            };

            let Some(first) = ids.first() else {
                debug!("No result for {request_id} yet ({endpoint})");
                self.stats.write().misses += 1;
                return Ok(None);
            };

            if ids.len() > 1 {
                debug!(
                    "{} result transactions for {request_id}, taking the first",
                    ids.len()
                );
            }

            let tx_id = first.clone();
            info!("Found result {tx_id} for {request_id} on {endpoint}");
            self.stats.write().hits += 1;
            return Ok(Some(tx_id));
        }

        Err(Error::AllEndpointsFailed(self.endpoints.len()))
    }

    async fn query_endpoint(&self, request: &HttpRequest) -> Result<Vec<ResultTxId>> {
        let response = send_with_retry(self.transport.as_ref(), request, &self.retry).await?;
        if !response.is_success() {
            return Err(Error::Gateway(format!("status {}", response.status)));
        }
        if !response.is_json() {
            return Err(Error::Gateway(format!(
                "unexpected content type {:?}",
                response.content_type.as_deref().unwrap_or("none")
            )));
        }
        let parsed: GraphQlResponse = serde_json::from_slice(&response.body)?;
        parsed
            .into_transaction_ids()?
            .into_iter()
            .map(|id| {
                ResultTxId::new(id.as_str())
                    .map_err(|_| Error::Gateway(format!("invalid transaction id {id:?}")))
            })
            .collect()
    }

    /// Fetch and decode the payload of a result transaction.
    ///
    /// Payloads that are not textual or do not decode into a
    /// [`ResultRecord`] are logged and reported as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllEndpointsFailed`] if every endpoint was unreachable.
    pub async fn fetch_result(&self, tx_id: &ResultTxId) -> Result<Option<ResultRecord>> {
        if let Some(record) = self.cache.get(tx_id) {
            debug!("Result {tx_id} served from cache");
            return Ok(Some(record));
        }

        let mut answered = false;
        for endpoint in &self.endpoints {
            let request = HttpRequest::get(format!("{endpoint}/{tx_id}"));
            let response = match send_with_retry(self.transport.as_ref(), &request, &self.retry)
                .await
            {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    // 404 while the payload propagates between gateways
                    warn!("Fetching {tx_id} from {endpoint} returned {}", response.status);
                    self.stats.write().endpoint_failures += 1;
                    answered = true;
                    continue;
                }
                Err(e) => {
                    warn!("Fetching {tx_id} from {endpoint} failed: {e}");
                    self.stats.write().endpoint_failures += 1;
                    continue;
                }
            };

            return match decode_result(&response) {
                Ok(record) => {
                    self.cache.insert(tx_id.clone(), record.clone());
                    Ok(Some(record))
                }
                Err(e) => {
                    warn!("Ignoring result {tx_id}: {e}");
                    self.stats.write().malformed += 1;
                    Ok(None)
                }
            };
        }

        if answered {
            debug!("Result {tx_id} not served by any gateway yet");
            return Ok(None);
        }
        Err(Error::AllEndpointsFailed(self.endpoints.len()))
    }

    /// Lookup statistics.
    #[must_use]
    pub fn stats(&self) -> QueryStats {
        self.stats.read().clone()
    }

    /// Reset lookup statistics.
    pub fn reset_stats(&self) {
        *self.stats.write() = QueryStats::default();
    }

    /// The decoded-record cache.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }
}

#[async_trait]
impl ResultLookup for GatewayClient {
    async fn lookup(&self, request_id: &RequestId) -> Result<Option<ResultRecord>> {
        match self.find_result_tx(request_id).await? {
            Some(tx_id) => self.fetch_result(&tx_id).await,
            None => Ok(None),
        }
    }
}

/// Decode a result payload.
///
/// # Errors
///
/// Returns [`Error::MalformedResult`] if the payload is not textual, not a
/// result record, or fails validation.
pub fn decode_result(response: &HttpResponse) -> Result<ResultRecord> {
    let text = response.text().ok_or_else(|| {
        Error::MalformedResult(format!(
            "payload is not text ({})",
            response.content_type.as_deref().unwrap_or("no content type")
        ))
    })?;
    let record: ResultRecord =
        serde_json::from_str(text).map_err(|e| Error::MalformedResult(e.to_string()))?;
    record.validate()?;
    Ok(record)
}
