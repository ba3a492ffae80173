//! Fact checker: submission plus one polling slot.

use crate::client::{ClaimSubmission, GatewayClient, RequestId, ResultLookup, Transport};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::event::{create_event_channel, PollEvent, PollEventsChannel, PollEventsSender};
use crate::session::{submission_failure, PollStatus, PollingSlot, SessionConfig, SessionHandle};
use crate::submit::{ClaimSubmitter, WalletProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Builder for constructing a fact checker.
pub struct FactCheckerBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl FactCheckerBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Use `transport` instead of the default HTTPS client.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the checker.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<FactChecker> {
        debug!("Building fact checker with config: {:?}", self.config);

        let gateway = match self.transport {
            Some(transport) => GatewayClient::with_transport(&self.config, transport)?,
            None => GatewayClient::new(&self.config)?,
        };
        let gateway = Arc::new(gateway);

        let submitter = ClaimSubmitter::new(
            gateway.transport(),
            gateway.endpoints().to_vec(),
            gateway.retry_policy(),
            self.config.gateway.app_name.clone(),
        );

        let (events_tx, _) = create_event_channel();
        let lookup: Arc<dyn ResultLookup> = Arc::clone(&gateway) as Arc<dyn ResultLookup>;
        let slot = PollingSlot::new(
            lookup,
            SessionConfig::from(&self.config.polling),
            events_tx.clone(),
        );

        Ok(FactChecker {
            gateway,
            submitter,
            slot,
            events_tx,
        })
    }
}

/// Submits claims and follows their results, one session at a time.
pub struct FactChecker {
    gateway: Arc<GatewayClient>,
    submitter: ClaimSubmitter,
    slot: PollingSlot,
    events_tx: PollEventsSender,
}

impl FactChecker {
    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe_events(&self) -> PollEventsChannel {
        self.events_tx.subscribe()
    }

    /// The gateway client used for lookups.
    #[must_use]
    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    /// Submit a claim and start polling for its result.
    ///
    /// Any running session is cancelled first. If submission fails the slot
    /// stays idle and a [`PollEvent::SubmissionFailed`] is published.
    ///
    /// # Errors
    ///
    /// Returns the submission error.
    pub async fn verify(
        &mut self,
        wallet: &dyn WalletProvider,
        claim: &ClaimSubmission,
    ) -> Result<&mut SessionHandle> {
        self.slot.cancel();

        match self.submitter.submit(wallet, claim).await {
            Ok(request_id) => {
                info!("Claim submitted as {request_id}");
                Ok(self.slot.start(request_id))
            }
            Err(e) => {
                let message = submission_failure(&e);
                let _ = self.events_tx.send(PollEvent::SubmissionFailed { message });
                Err(e)
            }
        }
    }

    /// Start polling a request submitted earlier.
    pub fn watch(&mut self, request_id: RequestId) -> &mut SessionHandle {
        self.slot.start(request_id)
    }

    /// Cancel the current session.
    pub fn cancel(&mut self) {
        self.slot.cancel();
    }

    /// The current session, if any.
    #[must_use]
    pub fn current(&self) -> Option<&SessionHandle> {
        self.slot.current()
    }

    /// The current session, mutably.
    pub fn current_mut(&mut self) -> Option<&mut SessionHandle> {
        self.slot.current_mut()
    }

    /// Status of the current session; `None` while idle.
    #[must_use]
    pub fn status(&self) -> Option<PollStatus> {
        self.slot.status()
    }
}
