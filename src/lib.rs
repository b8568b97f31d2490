// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Redshell - AI-simulated red team shell with artifact capture.
//!
//! This crate exposes the runtime used by the `redshell` CLI
//! (`src/main.rs`):
//! - [`session`]: the engagement model, store, and streaming engine
//! - [`parse`]: block classification and artifact mining
//! - [`llm`]: simulation backends (Gemini, mock)
//! - [`report`]: report synthesis from session evidence
//! - [`config`]: user settings under `~/.redshell`

pub mod config;
pub mod error;
pub mod llm;
pub mod parse;
pub mod report;
pub mod session;

pub use error::{RedshellError, Result};
