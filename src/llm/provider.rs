// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Provider traits and request types
//!
//! Defines the abstraction layer over simulation backends. The shell
//! provider streams terminal output for one exchange; the report
//! provider produces a complete document in a single call.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::session::model::{LogEntry, ReportKind, Sender};

/// Fragment stream returned by a shell exchange
pub type ShellStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Information about an available model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier as sent to the backend
    pub id: String,

    /// Human-readable name for listings
    pub display_name: String,
}

/// One shell exchange: the transcript so far plus the outbound command
#[derive(Debug, Clone)]
pub struct ShellRequest {
    /// Model to use
    pub model: String,

    /// Prior transcript, oldest first. System-sender entries are
    /// engine bookkeeping and are filtered before reaching the wire.
    pub transcript: Vec<LogEntry>,

    /// The command or sentinel being sent now
    pub message: String,

    /// Engagement target, already placeholder-resolved
    pub target: String,

    /// Engagement objective
    pub objective: String,

    /// Optional operator override appended to the system instruction
    pub custom_instruction: Option<String>,
}

impl ShellRequest {
    /// Transcript entries that belong on the wire. System entries are
    /// local bookkeeping (sentinels, error notices) and never become
    /// conversation turns.
    pub fn wire_history(&self) -> impl Iterator<Item = &LogEntry> {
        self.transcript.iter().filter(|e| e.sender != Sender::System)
    }
}

/// Request to synthesize a report from session evidence
#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// Model to use
    pub model: String,

    /// Which document shape to produce
    pub kind: ReportKind,

    /// Engagement target
    pub target: String,

    /// Engagement objective
    pub objective: String,

    /// Pre-capped evidence text assembled by the synthesizer
    pub evidence: String,
}

/// Backend that simulates the interactive shell
#[async_trait]
pub trait ShellProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "mock")
    fn name(&self) -> &str;

    /// List available models
    fn available_models(&self) -> Vec<ModelInfo>;

    /// Stream the shell output for one exchange
    async fn stream_shell(&self, request: ShellRequest) -> Result<ShellStream>;
}

/// Backend that produces finished report documents
#[async_trait]
pub trait ReportProvider: Send + Sync {
    /// Generate the full report body in one call
    async fn generate_report(&self, request: ReportRequest) -> Result<String>;
}
