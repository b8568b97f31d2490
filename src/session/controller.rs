// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Session engine
//!
//! Drives one shell exchange end to end: append the outbound turn,
//! stream the reply through the aggregator into the live agent entry,
//! then mine the finished text for artifacts. At most one exchange may
//! be live per session; a second send is rejected, not queued. Distinct
//! sessions stream independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{RedshellError, Result};
use crate::llm::provider::{ShellProvider, ShellRequest};
use crate::parse::artifacts::extract_artifacts;
use crate::session::aggregator::ChunkAggregator;
use crate::session::model::{LogEntry, Sender, Session, SessionStatus};
use crate::session::store::SessionStore;

/// Sentinel that makes the model print its boot banner
pub const BOOT_SEQUENCE: &str = "BOOT_SEQUENCE";

/// Sentinel that switches the model into auto-pilot
pub const AUTO_MISSION_START: &str = "[AUTO_MISSION_START]";

/// Pause between the boot exchange and the auto-pilot kickoff
pub const AUTO_START_DELAY: Duration = Duration::from_millis(500);

/// How one exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Stream ran to completion; artifacts were mined from the reply
    Completed { new_artifacts: usize },
    /// Operator interrupted the stream; partial content is kept
    Aborted,
    /// Stream failed; the message was appended as an error entry
    Errored { message: String },
}

/// The session engine: store, provider, and the live-exchange registry
pub struct SessionEngine {
    store: Arc<SessionStore>,
    provider: Arc<dyn ShellProvider>,
    aggregator: Mutex<ChunkAggregator>,
    active: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl SessionEngine {
    pub fn new(store: Arc<SessionStore>, provider: Arc<dyn ShellProvider>) -> Self {
        Self {
            store,
            provider,
            aggregator: Mutex::new(ChunkAggregator::new()),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Whether this session has a live exchange
    pub fn is_streaming(&self, session_id: Uuid) -> bool {
        lock(&self.active).contains_key(&session_id)
    }

    /// Number of aggregation buffers currently held open
    pub fn live_stream_count(&self) -> usize {
        lock(&self.aggregator).live_count()
    }

    /// Cancel the live exchange for a session, if any. Interrupting a
    /// session that is not streaming is a no-op.
    pub fn interrupt(&self, session_id: Uuid) -> bool {
        match lock(&self.active).get(&session_id) {
            Some(token) => {
                tracing::info!(session = %session_id, "interrupting live exchange");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run one visible exchange: the message renders as a user turn
    pub async fn send(&self, session_id: Uuid, message: &str) -> Result<ExchangeOutcome> {
        self.exchange(session_id, message, false).await
    }

    /// Run one hidden exchange for engine-issued sentinels
    pub async fn send_hidden(&self, session_id: Uuid, message: &str) -> Result<ExchangeOutcome> {
        self.exchange(session_id, message, true).await
    }

    /// Issue the boot and auto-pilot sentinels for a fresh session.
    /// Each fires at most once per session lifetime; the flags are set
    /// before sending so a crash mid-send never replays them.
    pub async fn bootstrap(&self, session_id: Uuid) -> Result<Vec<ExchangeOutcome>> {
        let mut outcomes = Vec::new();

        let session = self.require_session(session_id)?;
        if !session.has_booted && session.logs.is_empty() {
            self.store.mark_booted(session_id)?;
            let boot = self.send_hidden(session_id, BOOT_SEQUENCE).await?;
            let booted = matches!(boot, ExchangeOutcome::Completed { .. });
            outcomes.push(boot);
            if !booted {
                // No boot banner was recorded, so the mission cannot
                // start yet; the auto-start flag stays clear for the
                // next bootstrap
                return Ok(outcomes);
            }
        }

        let session = self.require_session(session_id)?;
        if !session.has_auto_started {
            self.store.mark_auto_started(session_id)?;
            tokio::time::sleep(AUTO_START_DELAY).await;
            outcomes.push(self.send_hidden(session_id, AUTO_MISSION_START).await?);
        }

        Ok(outcomes)
    }

    async fn exchange(
        &self,
        session_id: Uuid,
        message: &str,
        hidden: bool,
    ) -> Result<ExchangeOutcome> {
        let session = self.require_session(session_id)?;
        if session.status != SessionStatus::Running {
            return Err(RedshellError::Session(format!(
                "session {session_id} is not running"
            )));
        }

        // Claim the session; a second send while streaming is an error
        let token = CancellationToken::new();
        {
            let mut active = lock(&self.active);
            if active.contains_key(&session_id) {
                return Err(RedshellError::Session(format!(
                    "session {session_id} already has a live exchange"
                )));
            }
            active.insert(session_id, token.clone());
        }

        let result = self.run_exchange(&session, message, hidden, &token).await;

        lock(&self.active).remove(&session_id);
        result
    }

    async fn run_exchange(
        &self,
        session: &Session,
        message: &str,
        hidden: bool,
        token: &CancellationToken,
    ) -> Result<ExchangeOutcome> {
        let session_id = session.id;

        // Transcript snapshot excludes the outbound turn; the provider
        // receives it separately as the final user message
        let transcript = session.logs.clone();

        let outbound = if hidden {
            LogEntry::hidden(message)
        } else {
            LogEntry::new(Sender::User, message)
        };
        self.store.push_entry(session_id, outbound)?;

        // The agent entry exists from the first moment of the exchange,
        // even if cancellation lands before any fragment arrives
        let agent_entry = LogEntry::new(Sender::Agent, "");
        let entry_id = agent_entry.id;
        self.store.push_entry(session_id, agent_entry)?;

        let handle = lock(&self.aggregator).begin();

        let request = ShellRequest {
            model: session.model.clone(),
            transcript,
            message: message.to_string(),
            target: session.target.clone(),
            objective: session.objective.clone(),
            custom_instruction: session.custom_instruction.clone(),
        };

        tracing::debug!(session = %session_id, hidden, "starting shell exchange");

        let mut stream = match self.provider.stream_shell(request).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = lock(&self.aggregator).end(handle);
                let message = e.to_string();
                self.store.push_entry(session_id, LogEntry::error(&message))?;
                return Ok(ExchangeOutcome::Errored { message });
            }
        };

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    let _ = lock(&self.aggregator).end(handle);
                    tracing::info!(session = %session_id, "exchange aborted");
                    return Ok(ExchangeOutcome::Aborted);
                }

                item = stream.next() => match item {
                    Some(Ok(fragment)) => {
                        // On a store failure the handle must still be
                        // released or its buffer leaks for the process
                        // lifetime
                        let published = lock(&self.aggregator)
                            .append(&handle, &fragment)
                            .and_then(|snapshot| {
                                self.store.set_entry_content(session_id, entry_id, &snapshot)
                            });
                        if let Err(e) = published {
                            let _ = lock(&self.aggregator).end(handle);
                            return Err(e);
                        }
                    }
                    Some(Err(e)) if e.is_cancelled() => {
                        let _ = lock(&self.aggregator).end(handle);
                        return Ok(ExchangeOutcome::Aborted);
                    }
                    Some(Err(e)) => {
                        // The failure is recorded in the transcript; the
                        // session stays usable for further sends
                        let _ = lock(&self.aggregator).end(handle);
                        let message = e.to_string();
                        tracing::warn!(session = %session_id, error = %message, "exchange failed");
                        self.store.push_entry(session_id, LogEntry::error(&message))?;
                        return Ok(ExchangeOutcome::Errored { message });
                    }
                    None => break,
                },
            }
        }

        let full_text = lock(&self.aggregator).end(handle)?;
        let mined = extract_artifacts(&full_text);
        let new_artifacts = self.store.merge_artifacts(session_id, mined)?;

        tracing::debug!(session = %session_id, new_artifacts, "exchange completed");
        Ok(ExchangeOutcome::Completed { new_artifacts })
    }

    fn require_session(&self, session_id: Uuid) -> Result<Session> {
        self.store
            .get(session_id)
            .ok_or_else(|| RedshellError::Session(format!("unknown session: {session_id}")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("engine lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::MockProvider;
    use crate::session::model::CreateSession;

    fn engine_with(provider: MockProvider) -> (SessionEngine, Uuid) {
        let store = Arc::new(SessionStore::in_memory());
        let session = store
            .create(CreateSession {
                name: "test".to_string(),
                target: "10.0.0.1".to_string(),
                objective: "recon".to_string(),
                custom_instruction: None,
                model: "mock-model".to_string(),
            })
            .unwrap();
        (SessionEngine::new(store, Arc::new(provider)), session.id)
    }

    #[tokio::test]
    async fn test_send_appends_user_and_agent_entries() {
        let (engine, id) = engine_with(MockProvider::new().with_reply("root"));
        let outcome = engine.send(id, "whoami").await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Completed { new_artifacts: 0 });
        let session = engine.store().get(id).unwrap();
        assert_eq!(session.logs.len(), 2);
        assert_eq!(session.logs[0].sender, Sender::User);
        assert_eq!(session.logs[0].content, "whoami");
        assert_eq!(session.logs[1].sender, Sender::Agent);
        assert_eq!(session.logs[1].content, "root");
    }

    #[tokio::test]
    async fn test_fragments_accumulate_in_order() {
        let provider = MockProvider::new()
            .with_reply("PORT   STATE SERVICE\n80/tcp open  http")
            .with_fragment_size(3);
        let (engine, id) = engine_with(provider);

        engine.send(id, "nmap").await.unwrap();

        let session = engine.store().get(id).unwrap();
        assert_eq!(
            session.logs[1].content,
            "PORT   STATE SERVICE\n80/tcp open  http"
        );
    }

    #[tokio::test]
    async fn test_completed_exchange_mines_artifacts() {
        let reply = "Scanning...\n```text:nmap_scan.txt\n80/tcp open\n```\nDone.";
        let (engine, id) = engine_with(MockProvider::new().with_reply(reply));

        let outcome = engine.send(id, "nmap").await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Completed { new_artifacts: 1 });
        let session = engine.store().get(id).unwrap();
        assert_eq!(session.artifacts[0].filename, "nmap_scan.txt");
    }

    #[tokio::test]
    async fn test_hidden_send_marks_entry() {
        let (engine, id) = engine_with(MockProvider::new().with_reply("ok"));
        engine.send_hidden(id, BOOT_SEQUENCE).await.unwrap();

        let session = engine.store().get(id).unwrap();
        assert!(session.logs[0].hidden);
        assert_eq!(session.logs[0].sender, Sender::System);
    }

    #[tokio::test]
    async fn test_stream_error_appends_error_entry() {
        let (engine, id) = engine_with(MockProvider::new().with_error("connection reset"));
        let outcome = engine.send(id, "ls").await.unwrap();

        assert!(matches!(outcome, ExchangeOutcome::Errored { .. }));
        let session = engine.store().get(id).unwrap();
        // A failed exchange does not kill the session
        assert_eq!(session.status, SessionStatus::Running);
        let last = session.logs.last().unwrap();
        assert!(last.is_error);
        assert!(last.content.contains("connection reset"));
        assert!(!engine.is_streaming(id));
    }

    #[tokio::test]
    async fn test_interrupt_before_first_fragment_keeps_empty_entry() {
        let provider = MockProvider::new()
            .with_reply("never seen")
            .with_initial_delay(Duration::from_millis(200));
        let (engine, id) = engine_with(provider);

        let engine = Arc::new(engine);
        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.send(id, "nmap").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.interrupt(id));

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, ExchangeOutcome::Aborted);

        let session = engine.store().get(id).unwrap();
        assert_eq!(session.logs[1].content, "");
        assert!(session.artifacts.is_empty());
        assert!(!engine.is_streaming(id));
    }

    #[tokio::test]
    async fn test_interrupt_idle_session_is_noop() {
        let (engine, id) = engine_with(MockProvider::new());
        assert!(!engine.interrupt(id));
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_rejected() {
        let provider = MockProvider::new()
            .with_reply("slow")
            .with_initial_delay(Duration::from_millis(200));
        let (engine, id) = engine_with(provider);
        let engine = Arc::new(engine);

        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.send(id, "first").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = engine.send(id, "second").await.unwrap_err();
        assert!(matches!(err, RedshellError::Session(_)));

        engine.interrupt(id);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_send_to_terminated_session_rejected() {
        let (engine, id) = engine_with(MockProvider::new().with_reply("x"));
        engine.store().terminate(id).unwrap();

        let err = engine.send(id, "ls").await.unwrap_err();
        assert!(matches!(err, RedshellError::Session(_)));
    }

    #[tokio::test]
    async fn test_send_unknown_session() {
        let (engine, _) = engine_with(MockProvider::new());
        let err = engine.send(Uuid::new_v4(), "ls").await.unwrap_err();
        assert!(matches!(err, RedshellError::Session(_)));
    }

    #[tokio::test]
    async fn test_store_failure_midstream_releases_buffer() {
        use crate::session::store::SessionSink;
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Sink that starts failing after a few successful persists,
        // so the failure lands on a set_entry_content mid-stream
        struct FlakySink {
            persists: AtomicUsize,
            fail_after: usize,
        }
        impl SessionSink for FlakySink {
            fn persist(&self, _sessions: &[crate::session::model::Session]) -> crate::error::Result<()> {
                if self.persists.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                    return Err(std::io::Error::other("disk full").into());
                }
                Ok(())
            }
        }

        let store = Arc::new(SessionStore::new(
            Vec::new(),
            Box::new(FlakySink {
                persists: AtomicUsize::new(0),
                fail_after: 3,
            }),
        ));
        let session = store
            .create(CreateSession {
                name: "t".to_string(),
                target: "10.0.0.1".to_string(),
                objective: "recon".to_string(),
                custom_instruction: None,
                model: "mock-model".to_string(),
            })
            .unwrap();
        let provider = MockProvider::new().with_reply("long enough reply").with_fragment_size(4);
        let engine = SessionEngine::new(store, Arc::new(provider));

        let err = engine.send(session.id, "ls").await.unwrap_err();
        assert!(matches!(err, RedshellError::Io(_)));

        // The exchange failed, but neither the claim nor the buffer leaks
        assert!(!engine.is_streaming(session.id));
        assert_eq!(engine.live_stream_count(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_sends_sentinels_once() {
        let provider = MockProvider::new().with_reply("[    0.200000] System Ready.");
        let recorder = provider.clone();
        let (engine, id) = engine_with(provider);

        let outcomes = engine.bootstrap(id).await.unwrap();
        assert_eq!(outcomes.len(), 2);

        let messages: Vec<String> = recorder
            .recorded_shell_requests()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec![BOOT_SEQUENCE, AUTO_MISSION_START]);

        // Second bootstrap is a no-op
        let outcomes = engine.bootstrap(id).await.unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(recorder.shell_call_count(), 2);
    }

    #[tokio::test]
    async fn test_bootstrap_aborted_boot_defers_auto_start() {
        let provider = MockProvider::new()
            .with_reply("[    0.200000] System Ready.")
            .with_initial_delay(Duration::from_millis(200));
        let recorder = provider.clone();
        let (engine, id) = engine_with(provider);
        let engine = Arc::new(engine);

        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.bootstrap(id).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.interrupt(id));

        // An interrupted boot records no banner, so the mission start
        // is not issued in the same pass
        let outcomes = task.await.unwrap().unwrap();
        assert_eq!(outcomes, vec![ExchangeOutcome::Aborted]);
        assert_eq!(recorder.shell_call_count(), 1);

        let session = engine.store().get(id).unwrap();
        assert!(session.has_booted);
        assert!(!session.has_auto_started);

        // The next bootstrap may still kick off the mission
        let outcomes = engine.bootstrap(id).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        let messages: Vec<String> = recorder
            .recorded_shell_requests()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec![BOOT_SEQUENCE, AUTO_MISSION_START]);
    }

    #[tokio::test]
    async fn test_transcript_snapshot_excludes_outbound_turn() {
        let provider = MockProvider::new().with_reply("ok");
        let recorder = provider.clone();
        let (engine, id) = engine_with(provider);

        engine.send(id, "first").await.unwrap();
        engine.send(id, "second").await.unwrap();

        let requests = recorder.recorded_shell_requests();
        assert!(requests[0].transcript.is_empty());
        // Second request sees the first exchange but not its own turn
        let contents: Vec<&str> = requests[1]
            .transcript
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "ok"]);
    }

    #[tokio::test]
    async fn test_sessions_stream_independently() {
        let provider = MockProvider::new()
            .with_reply("slow")
            .with_initial_delay(Duration::from_millis(150));
        let store = Arc::new(SessionStore::in_memory());
        let mk = |name: &str| CreateSession {
            name: name.to_string(),
            target: "10.0.0.1".to_string(),
            objective: "recon".to_string(),
            custom_instruction: None,
            model: "mock-model".to_string(),
        };
        let a = store.create(mk("a")).unwrap();
        let b = store.create(mk("b")).unwrap();
        let engine = Arc::new(SessionEngine::new(store, Arc::new(provider)));

        let task_a = {
            let engine = Arc::clone(&engine);
            let id = a.id;
            tokio::spawn(async move { engine.send(id, "x").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Session b streams while a is still live
        assert!(engine.is_streaming(a.id));
        let task_b = {
            let engine = Arc::clone(&engine);
            let id = b.id;
            tokio::spawn(async move { engine.send(id, "y").await })
        };

        // Interrupting a must not touch b
        engine.interrupt(a.id);
        assert_eq!(task_a.await.unwrap().unwrap(), ExchangeOutcome::Aborted);
        assert!(matches!(
            task_b.await.unwrap().unwrap(),
            ExchangeOutcome::Completed { .. }
        ));
    }
}
