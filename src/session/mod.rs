// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Session module for Redshell
//!
//! The engagement model, the store that owns it, the chunk aggregator,
//! and the engine that drives exchanges.

pub mod aggregator;
pub mod controller;
pub mod model;
pub mod store;

pub use controller::{ExchangeOutcome, SessionEngine};
pub use model::*;
pub use store::{JsonFileSink, NullSink, SessionSink, SessionStore};
