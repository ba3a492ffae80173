//! Gateway client module for truthguard.
//!
//! This module holds everything that talks to Arweave gateways: the
//! transport seam, the per-request retry wrapper, the typed GraphQL query
//! builder, and the [`GatewayClient`] that discovers and decodes the agent's
//! result for a submitted claim.
//!
//! # Architecture
//!
//! ```text
//! ResultLookup::lookup(request_id)
//!     │
//!     ├── GatewayClient::find_result_tx   (endpoints in priority order)
//!     │       └── send_with_retry ──► Transport
//!     │
//!     └── GatewayClient::fetch_result     (MalformedResult → None)
//!             └── send_with_retry ──► Transport
//! ```
//!
//! # Failure handling
//!
//! Failures below the lookup are absorbed into three outcomes: retry the
//! request, try the next endpoint, or report "no result yet". Only
//! [`crate::Error::AllEndpointsFailed`] and query construction errors leave
//! [`ResultLookup::lookup`].

mod cache;
mod data_types;
mod gateway;
pub mod query;
mod retry;
mod transport;

pub use cache::{CacheStats, ResultCache};
pub use data_types::{
    tags, ClaimSubmission, EvidenceSource, RequestId, ResultRecord, ResultTxId, Tag, Verdict,
};
pub use gateway::{decode_result, GatewayClient, QueryStats};
pub use retry::{send_with_retry, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

#[cfg(test)]
pub(crate) use transport::mock as transport_mock;

use crate::error::Result;
use async_trait::async_trait;

/// Source of decoded result records for submitted claims.
///
/// [`GatewayClient`] is the network implementation; the polling session only
/// depends on this trait.
#[async_trait]
pub trait ResultLookup: Send + Sync {
    /// Find and decode the result for `request_id`.
    ///
    /// `Ok(None)` means no usable result exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the network could not be consulted at all.
    async fn lookup(&self, request_id: &RequestId) -> Result<Option<ResultRecord>>;
}
