//! Claim submission.
//!
//! A claim becomes a data transaction tagged with the application name, its
//! content type and `Type = FactCheckRequest`. The wallet provider signs it
//! (the private key never reaches this crate) and the signed transaction is
//! posted to the first gateway that accepts it (200 or 202, or 208 when the
//! gateway already holds the transaction). The network id of that
//! transaction is the [`RequestId`] the polling session follows.
//!
//! Every wallet call is checked before moving on: a refused connection, a
//! missing address or a refused signature aborts the submission with
//! [`Error::WalletUnavailable`] before anything is uploaded.

use crate::client::{
    send_with_retry, ClaimSubmission, HttpRequest, RequestId, RetryPolicy, Tag, Transport,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Permissions requested from the wallet before submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read the active address.
    AccessAddress,
    /// Sign transactions.
    SignTransaction,
}

/// Permissions needed to submit a claim.
pub const SUBMIT_PERMISSIONS: &[Permission] =
    &[Permission::AccessAddress, Permission::SignTransaction];

/// A transaction waiting for the wallet's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    /// Payload bytes.
    pub data: Bytes,
    /// Transaction tags.
    pub tags: Vec<Tag>,
    /// Address expected to sign.
    pub owner_address: String,
}

/// A transaction signed by the wallet, ready to post.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    /// Network id claimed by the wallet.
    pub id: String,
    /// Base64url signature.
    pub signature: String,
    /// Transaction JSON as posted to `/tx`.
    pub payload: serde_json::Value,
}

impl SignedTransaction {
    /// Network id implied by the signature: base64url(SHA-256(signature)).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadFailed`] if the signature is not base64url.
    pub fn derived_id(&self) -> Result<String> {
        let signature = URL_SAFE_NO_PAD
            .decode(self.signature.as_bytes())
            .map_err(|e| Error::UploadFailed(format!("signature is not base64url: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(&signature)))
    }

    /// Check that the claimed id matches the signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadFailed`] on mismatch.
    pub fn verify_id(&self) -> Result<RequestId> {
        let derived = self.derived_id()?;
        if derived != self.id {
            return Err(Error::UploadFailed(format!(
                "wallet returned id {} but the signature implies {derived}",
                self.id
            )));
        }
        RequestId::new(derived)
    }
}

/// A wallet that can grant permissions and sign transactions.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to connect and grant `permissions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet is missing or the user refuses.
    async fn connect(&self, permissions: &[Permission]) -> Result<()>;

    /// Address of the active account.
    ///
    /// # Errors
    ///
    /// Returns an error if no account is active.
    async fn active_address(&self) -> Result<String>;

    /// Sign a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the user refuses or signing fails.
    async fn sign(&self, transaction: UnsignedTransaction) -> Result<SignedTransaction>;
}

/// Uploads claims to the network.
pub struct ClaimSubmitter {
    transport: Arc<dyn Transport>,
    endpoints: Vec<String>,
    retry: RetryPolicy,
    app_name: String,
}

impl ClaimSubmitter {
    /// Create a submitter posting to `endpoints` in order.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Vec<String>,
        retry: RetryPolicy,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            retry,
            app_name: app_name.into(),
        }
    }

    /// Build the unsigned transaction for a claim.
    #[must_use]
    pub fn build_transaction(&self, claim: &ClaimSubmission, owner_address: String) -> UnsignedTransaction {
        UnsignedTransaction {
            data: Bytes::copy_from_slice(claim.content().as_bytes()),
            tags: claim.tags(&self.app_name),
            owner_address,
        }
    }

    /// Connect the wallet, sign the claim and upload it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WalletUnavailable`] if any wallet step fails, and
    /// [`Error::UploadFailed`] if the signed transaction is inconsistent or no
    /// gateway accepts it.
    pub async fn submit(
        &self,
        wallet: &dyn WalletProvider,
        claim: &ClaimSubmission,
    ) -> Result<RequestId> {
        wallet
            .connect(SUBMIT_PERMISSIONS)
            .await
            .map_err(|e| Error::WalletUnavailable(format!("connect: {e}")))?;
        let address = wallet
            .active_address()
            .await
            .map_err(|e| Error::WalletUnavailable(format!("active address: {e}")))?;
        if address.trim().is_empty() {
            return Err(Error::WalletUnavailable("wallet has no active address".into()));
        }

        let unsigned = self.build_transaction(claim, address);
        debug!(
            "Signing claim ({} bytes, {} tags) for {}",
            unsigned.data.len(),
            unsigned.tags.len(),
            unsigned.owner_address
        );
        let signed = wallet
            .sign(unsigned)
            .await
            .map_err(|e| Error::WalletUnavailable(format!("sign: {e}")))?;
        let request_id = signed.verify_id()?;

        for endpoint in &self.endpoints {
            let request = HttpRequest::post_json(format!("{endpoint}/tx"), &signed.payload)?;
            match send_with_retry(self.transport.as_ref(), &request, &self.retry).await {
                Ok(response) if matches!(response.status, 200 | 202 | 208) => {
                    info!("Claim {request_id} accepted by {endpoint}");
                    return Ok(request_id);
                }
                Ok(response) => {
                    warn!("{endpoint} rejected claim {request_id}: status {}", response.status);
                }
                Err(e) => {
                    warn!("Posting claim {request_id} to {endpoint} failed: {e}");
                }
            }
        }

        Err(Error::UploadFailed(format!(
            "no gateway accepted transaction {request_id}"
        )))
    }
}
