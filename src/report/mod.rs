// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Report synthesis
//!
//! Assembles capped evidence from a session's artifacts and transcript,
//! hands it to a [`ReportProvider`], and attaches the finished document
//! to the session.

use std::sync::Arc;

use crate::error::{RedshellError, Result};
use crate::llm::provider::{ReportProvider, ReportRequest};
use crate::session::model::{Report, ReportKind, Sender, Session};
use crate::session::store::SessionStore;

/// Per-artifact content cap in the evidence block, in characters
const ARTIFACT_CONTENT_CAP: usize = 5_000;

/// How many trailing transcript entries feed the evidence block
const LOG_HISTORY_CAP: usize = 30;

/// Per-entry cap in the evidence block, in characters
const LOG_ENTRY_CAP: usize = 200;

/// Builds reports from session evidence
pub struct ReportSynthesizer {
    provider: Arc<dyn ReportProvider>,
    store: Arc<SessionStore>,
}

impl ReportSynthesizer {
    pub fn new(provider: Arc<dyn ReportProvider>, store: Arc<SessionStore>) -> Self {
        Self { provider, store }
    }

    /// Generate a report for a session and attach it, most-recent-first
    pub async fn synthesize(&self, session_id: uuid::Uuid, kind: ReportKind) -> Result<Report> {
        let session = self
            .store
            .get(session_id)
            .ok_or_else(|| RedshellError::Session(format!("unknown session: {session_id}")))?;

        let evidence = build_evidence(&session);

        tracing::info!(session = %session_id, kind = kind.label(), "synthesizing report");

        let request = ReportRequest {
            model: session.model.clone(),
            kind,
            target: session.target.clone(),
            objective: session.objective.clone(),
            evidence,
        };

        let content = self.provider.generate_report(request).await?;
        if content.trim().is_empty() {
            return Err(RedshellError::Report(
                "provider returned an empty document".to_string(),
            ));
        }

        let report = Report {
            id: uuid::Uuid::new_v4(),
            title: format!("{} Report - {}", kind.title_prefix(), session.target),
            kind,
            content,
            created_at: chrono::Utc::now(),
            generated_by: "redshell".to_string(),
        };

        self.store.push_report(session_id, report.clone())?;
        Ok(report)
    }
}

/// Assemble the capped evidence block: every artifact (content capped),
/// then the tail of the visible transcript
fn build_evidence(session: &Session) -> String {
    let artifacts = if session.artifacts.is_empty() {
        "No specific file artifacts found. Rely on logs.".to_string()
    } else {
        session
            .artifacts
            .iter()
            .map(|a| {
                format!(
                    "--- ARTIFACT: {} ({}) ---\n{}",
                    a.filename,
                    a.artifact_type,
                    truncate_chars(&a.content, ARTIFACT_CONTENT_CAP)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let visible: Vec<&crate::session::model::LogEntry> = session
        .logs
        .iter()
        .filter(|l| l.sender != Sender::System)
        .collect();
    let tail_start = visible.len().saturating_sub(LOG_HISTORY_CAP);
    let logs = visible[tail_start..]
        .iter()
        .map(|l| {
            let sender = match l.sender {
                Sender::User => "USER",
                Sender::Agent => "AGENT",
                Sender::System => "SYSTEM",
            };
            format!("[{}]: {}", sender, truncate_chars(&l.content, LOG_ENTRY_CAP))
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("{artifacts}\n\n**RECENT TERMINAL LOGS:**\n{logs}")
}

/// Truncate to at most `max` characters, never splitting a code point
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
