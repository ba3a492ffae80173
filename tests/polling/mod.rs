//! End-to-end polling tests against an in-memory gateway.
//!
//! The [`FakeGateway`] transport answers GraphQL queries, payload fetches and
//! uploads the way an Arweave gateway does, and publishes a result only after
//! a configurable number of queries. Time is paused, so a full session runs
//! instantly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod harness;

#[cfg(test)]
mod scenarios;

pub use harness::{FakeGateway, FakeWallet, TestHarness};
