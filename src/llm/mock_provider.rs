// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Mock provider for testing
//!
//! Provides a configurable mock implementation of both provider traits
//! that can be used in unit tests without making real API calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ProviderError, RedshellError, Result};
use crate::llm::provider::{
    ModelInfo, ReportProvider, ReportRequest, ShellProvider, ShellRequest, ShellStream,
};

/// A scripted reply for one shell exchange
#[derive(Clone, Debug)]
enum MockReply {
    /// Stream this text in fragments
    Text(String),
    /// Fail the stream after any fragments already yielded
    Error(String),
}

/// A mock simulation backend for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Scripted replies, consumed front to back
    replies: Arc<Mutex<Vec<MockReply>>>,
    /// Fragment size in bytes when chunking scripted text
    fragment_size: usize,
    /// Delay before the first fragment; lets tests win cancellation races
    initial_delay: Option<Duration>,
    /// Shell call counter
    shell_calls: Arc<AtomicUsize>,
    /// Report call counter
    report_calls: Arc<AtomicUsize>,
    /// Recorded shell requests
    recorded_shell: Arc<Mutex<Vec<ShellRequest>>>,
    /// Recorded report requests
    recorded_reports: Arc<Mutex<Vec<ReportRequest>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock provider with one empty scripted reply
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(vec![MockReply::Text(String::new())])),
            fragment_size: 8,
            initial_delay: None,
            shell_calls: Arc::new(AtomicUsize::new(0)),
            report_calls: Arc::new(AtomicUsize::new(0)),
            recorded_shell: Arc::new(Mutex::new(vec![])),
            recorded_reports: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Set a single scripted reply
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        {
            let mut replies = lock(&self.replies);
            replies.clear();
            replies.push(MockReply::Text(text.into()));
        }
        self
    }

    /// Queue multiple scripted replies, returned in order
    pub fn with_replies(self, texts: Vec<String>) -> Self {
        {
            let mut replies = lock(&self.replies);
            replies.clear();
            replies.extend(texts.into_iter().map(MockReply::Text));
        }
        self
    }

    /// Queue a reply that fails mid-stream
    pub fn with_error(self, message: impl Into<String>) -> Self {
        {
            let mut replies = lock(&self.replies);
            replies.clear();
            replies.push(MockReply::Error(message.into()));
        }
        self
    }

    /// Set the fragment size used when chunking replies
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size.max(1);
        self
    }

    /// Delay the first fragment, for cancellation race tests
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Number of shell exchanges started
    pub fn shell_call_count(&self) -> usize {
        self.shell_calls.load(Ordering::SeqCst)
    }

    /// Number of report calls made
    pub fn report_call_count(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    /// Shell requests received so far
    pub fn recorded_shell_requests(&self) -> Vec<ShellRequest> {
        lock(&self.recorded_shell).clone()
    }

    /// Report requests received so far
    pub fn recorded_report_requests(&self) -> Vec<ReportRequest> {
        lock(&self.recorded_reports).clone()
    }

    fn next_reply(&self) -> MockReply {
        let mut replies = lock(&self.replies);
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies
                .first()
                .cloned()
                .unwrap_or(MockReply::Text(String::new()))
        }
    }

    /// Split text into fragments at character boundaries
    fn fragments(text: &str, size: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            current.push(ch);
            if current.len() >= size {
                out.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }
}

#[async_trait]
impl ShellProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".to_string(),
            display_name: "Mock Model".to_string(),
        }]
    }

    async fn stream_shell(&self, request: ShellRequest) -> Result<ShellStream> {
        self.shell_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded_shell).push(request);

        let reply = self.next_reply();
        let fragment_size = self.fragment_size;
        let initial_delay = self.initial_delay;

        let stream = async_stream::stream! {
            if let Some(delay) = initial_delay {
                tokio::time::sleep(delay).await;
            }
            match reply {
                MockReply::Text(text) => {
                    for fragment in MockProvider::fragments(&text, fragment_size) {
                        yield Ok(fragment);
                    }
                }
                MockReply::Error(message) => {
                    yield Err(RedshellError::Provider(ProviderError::StreamError(message)));
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ReportProvider for MockProvider {
    async fn generate_report(&self, request: ReportRequest) -> Result<String> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded_reports).push(request);

        match self.next_reply() {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(message) => Err(RedshellError::Provider(
                ProviderError::ServerError {
                    status: 500,
                    message,
                },
            )),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("mock provider lock was poisoned, recovering");
        poisoned.into_inner()
    })
}
