//! Integration tests for Tangelo.
//!
//! The tests in `tests/` exercise the fulfillment engine's domain logic
//! end-to-end at the model layer: the stock ledger transitions, the order
//! and payment state machines, and the webhook reconciliation planner.
//! They deliberately run without a live database so they are part of every
//! `cargo test`.
//!
//! # Test Categories
//!
//! - `ledger_scenarios` - full checkout/webhook/reaper scenarios
//! - `ledger_concurrency` - serialized reservations under contention
//! - `order_lifecycle` - state machine walks and idempotent reconciliation
