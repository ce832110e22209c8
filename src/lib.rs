//! tally - payment reconciliation and wallet ledger service
//!
//! Talks to two payment gateways (PayPal, Mollie), verifies inbound
//! webhooks under each provider's trust model, unifies their status
//! vocabularies into one forward-only settlement lifecycle, and maintains
//! an append-only wallet ledger from which balances are derived.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod retry;
pub mod settlement;
