//! Typed GraphQL transaction queries.
//!
//! Queries are built from validated tag filters and sent with the filter
//! values as GraphQL variables:
//!
//! ```text
//! { "query": "query FindTransactions($tags: [TagFilter!], $first: Int) { ... }",
//!   "variables": { "tags": [{ "name": "Type", "values": ["FactCheckResult"] }], "first": 10 } }
//! ```

use super::data_types::{tags, RequestId, Tag};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// GraphQL document shared by every transaction lookup.
pub const FIND_TRANSACTIONS: &str = "query FindTransactions($tags: [TagFilter!], $first: Int) { \
transactions(tags: $tags, first: $first) { edges { node { id tags { name value } } } } }";

/// Largest page size gateways accept.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used for result lookups.
pub const RESULT_PAGE_SIZE: u32 = 10;

/// Matches transactions carrying tag `name` with any of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagFilter {
    /// Tag name.
    pub name: String,
    /// Accepted values.
    pub values: Vec<String>,
}

/// A validated transaction query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    tags: Vec<TagFilter>,
    first: u32,
}

/// Request body posted to a GraphQL endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a> {
    /// GraphQL document.
    pub query: &'static str,
    /// Variables referenced by the document.
    pub variables: QueryVariables<'a>,
}

/// Variables of [`FIND_TRANSACTIONS`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryVariables<'a> {
    /// Tag filters, all of which must match.
    pub tags: &'a [TagFilter],
    /// Page size.
    pub first: u32,
}

impl TransactionQuery {
    /// Start building a query.
    #[must_use]
    pub fn builder() -> TransactionQueryBuilder {
        TransactionQueryBuilder::default()
    }

    /// Query for result transactions written for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if `app_name` is empty.
    pub fn results_for(app_name: &str, request_id: &RequestId) -> Result<Self> {
        Self::builder()
            .tag(tags::APP_NAME, app_name)
            .tag(tags::TYPE, tags::RESULT_TYPE)
            .tag(tags::RELATED_REQUEST, request_id.as_str())
            .first(RESULT_PAGE_SIZE)
            .build()
    }

    /// Tag filters.
    #[must_use]
    pub fn tags(&self) -> &[TagFilter] {
        &self.tags
    }

    /// Page size.
    #[must_use]
    pub fn first(&self) -> u32 {
        self.first
    }

    /// Request body for this query.
    #[must_use]
    pub fn to_request(&self) -> GraphQlRequest<'_> {
        GraphQlRequest {
            query: FIND_TRANSACTIONS,
            variables: QueryVariables {
                tags: &self.tags,
                first: self.first,
            },
        }
    }
}

/// Builder for [`TransactionQuery`].
#[derive(Debug, Clone)]
pub struct TransactionQueryBuilder {
    tags: Vec<Tag>,
    first: u32,
}

impl Default for TransactionQueryBuilder {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            first: RESULT_PAGE_SIZE,
        }
    }
}

impl TransactionQueryBuilder {
    /// Require tag `name` to equal `value`.
    #[must_use]
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }

    /// Page size.
    #[must_use]
    pub fn first(mut self, first: u32) -> Self {
        self.first = first;
        self
    }

    /// Validate and build the query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if there are no tags, a tag name or
    /// value is blank, a tag name repeats, or the page size is outside
    /// `1..=100`.
    pub fn build(self) -> Result<TransactionQuery> {
        if self.tags.is_empty() {
            return Err(Error::InvalidQuery("at least one tag is required".into()));
        }
        if self.first == 0 || self.first > MAX_PAGE_SIZE {
            return Err(Error::InvalidQuery(format!(
                "page size {} is outside 1..={MAX_PAGE_SIZE}",
                self.first
            )));
        }

        let mut seen = HashSet::new();
        let mut filters = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            if tag.name.trim().is_empty() {
                return Err(Error::InvalidQuery("tag name is empty".into()));
            }
            if tag.value.trim().is_empty() {
                return Err(Error::InvalidQuery(format!("tag {:?} has an empty value", tag.name)));
            }
            if !seen.insert(tag.name.clone()) {
                return Err(Error::InvalidQuery(format!("tag {:?} appears twice", tag.name)));
            }
            filters.push(TagFilter {
                name: tag.name,
                values: vec![tag.value],
            });
        }

        Ok(TransactionQuery {
            tags: filters,
            first: self.first,
        })
    }
}

/// GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    /// Query data, absent on hard errors.
    pub data: Option<TransactionsData>,
    /// Query-level errors.
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// `data` field of the response.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsData {
    /// Matching transactions.
    pub transactions: TransactionConnection,
}

/// Paged transaction list.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConnection {
    /// One edge per transaction.
    #[serde(default)]
    pub edges: Vec<TransactionEdge>,
}

/// Edge wrapping one transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEdge {
    /// The transaction.
    pub node: TransactionNode,
}

/// A matching transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionNode {
    /// Transaction id.
    pub id: String,
    /// Transaction tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// An entry of the `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    /// Error message.
    pub message: String,
}

impl GraphQlResponse {
    /// Transaction ids in the order the gateway returned them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Gateway`] if the response carries errors or no data.
    pub fn into_transaction_ids(self) -> Result<Vec<String>> {
        if !self.errors.is_empty() {
            let messages: Vec<_> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(Error::Gateway(messages.join("; ")));
        }
        let data = self
            .data
            .ok_or_else(|| Error::Gateway("response has no data".into()))?;
        Ok(data
            .transactions
            .edges
            .into_iter()
            .map(|edge| edge.node.id)
            .collect())
    }
}
