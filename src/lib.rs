//! # truthguard
//!
//! Client for the TruthGuard fact-checking agent on the Arweave permaweb.
//!
//! A claim is written to the network as a tagged transaction. An off-chain
//! agent later writes a `FactCheckResult` transaction that points back at
//! the claim through a `Related-Request` tag. This crate submits claims,
//! discovers those result transactions through redundant GraphQL gateways,
//! decodes them, and drives a bounded polling session that reports a single
//! terminal outcome.
//!
//! ## Layers
//!
//! - [`client`]: transport seam, retry wrapper, typed query builder and the
//!   multi-endpoint [`GatewayClient`]
//! - [`session`]: the polling state machine and its tokio driver
//! - [`submit`]: wallet pre-flight and claim upload
//! - [`checker`]: ties submission and polling together for one UI slot
//!
//! ## Example
//!
//! ```rust,ignore
//! use truthguard::{ClientConfig, FactCheckerBuilder, RequestId};
//!
//! #[tokio::main]
//! async fn main() -> truthguard::Result<()> {
//!     let mut checker = FactCheckerBuilder::new(ClientConfig::default()).build()?;
//!     let mut events = checker.subscribe_events();
//!
//!     let session = checker.watch(RequestId::new("R1")?);
//!     let finished = session.finished().await;
//!     println!("{:?}", finished.status());
//!     Ok(())
//! }
//! ```


pub mod checker;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod submit;

pub use checker::{FactChecker, FactCheckerBuilder};
pub use client::{
    ClaimSubmission, EvidenceSource, GatewayClient, RequestId, ResultLookup, ResultRecord,
    ResultTxId, Verdict,
};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use event::{PollEvent, PollEventsChannel, PollEventsSender};
pub use session::{PollStatus, PollingSession, PollingSlot, SessionHandle};
pub use submit::{ClaimSubmitter, WalletProvider};
