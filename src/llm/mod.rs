// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Simulation backend module for Redshell
//!
//! Provides abstraction over the model backends that drive the shell
//! and write reports.

pub mod gemini;
pub mod mock_provider;
pub mod prompts;
pub mod provider;

pub use provider::*;
