// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Session data model
//!
//! A [`Session`] is one engagement: a transcript of [`LogEntry`] turns,
//! the [`Artifact`]s mined from agent output, and any generated
//! [`Report`]s. Sessions are plain values; they are owned by the
//! `SessionStore` and mutated only through its operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Who authored a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
    Agent,
}

/// One turn in a session transcript
///
/// A streaming agent entry is created empty and is the only entry whose
/// content is rewritten while the stream is live; all other entries are
/// write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
    /// Engine-issued sentinels are kept out of rendered transcripts but
    /// still carry a user turn on the wire
    #[serde(default)]
    pub hidden: bool,
}

impl LogEntry {
    /// Create a new entry with a fresh id and the current timestamp
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sender,
            content: content.into(),
            is_error: false,
            hidden: false,
        }
    }

    /// Create a hidden system entry for engine-issued sentinels
    pub fn hidden(content: impl Into<String>) -> Self {
        let mut entry = Self::new(Sender::System, content);
        entry.hidden = true;
        entry
    }

    /// Create an error-flagged system entry
    pub fn error(message: impl Into<String>) -> Self {
        let mut entry = Self::new(Sender::System, message);
        entry.is_error = true;
        entry
    }

    /// Produce a copy of this entry with new content (copy-on-write:
    /// the streaming entry is replaced wholesale, never mutated in place)
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id,
            timestamp: self.timestamp,
            sender: self.sender,
            content: content.into(),
            is_error: self.is_error,
            hidden: self.hidden,
        }
    }
}

/// A named unit of output captured from a finished agent message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub filename: String,
    /// Declared type tag from the fence header ("text", "python", ...)
    pub artifact_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Byte length of the trimmed content
    pub size: usize,
}

impl Artifact {
    /// Create an artifact from extracted fence parts
    pub fn new(
        filename: impl Into<String>,
        artifact_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            artifact_type: artifact_type.into(),
            size: content.len(),
            content,
            created_at: Utc::now(),
        }
    }
}

/// Kind of report the synthesizer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Executive,
    Technical,
    Full,
}

impl ReportKind {
    /// Uppercase label used in provider prompts
    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Executive => "EXECUTIVE",
            ReportKind::Technical => "TECHNICAL",
            ReportKind::Full => "FULL",
        }
    }

    /// Title prefix for generated reports
    pub fn title_prefix(&self) -> &'static str {
        match self {
            ReportKind::Executive => "Executive",
            ReportKind::Technical => "Technical",
            ReportKind::Full => "Full",
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "executive" => Ok(ReportKind::Executive),
            "technical" => Ok(ReportKind::Technical),
            "full" => Ok(ReportKind::Full),
            other => Err(format!("unknown report kind: {other}")),
        }
    }
}

/// A generated assessment report attached to a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub kind: ReportKind,
    /// Markdown content
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub generated_by: String,
}

/// Parameters for creating a new session
#[derive(Debug, Clone, Default)]
pub struct CreateSession {
    pub name: String,
    pub target: String,
    pub objective: String,
    pub custom_instruction: Option<String>,
    pub model: String,
}

/// One engagement with its own transcript, artifacts, and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub objective: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instruction: Option<String>,
    pub model: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub reports: Vec<Report>,
    /// Whether the hidden BOOT_SEQUENCE send has been issued
    #[serde(default)]
    pub has_booted: bool,
    /// Whether the hidden mission-start send has been issued
    #[serde(default)]
    pub has_auto_started: bool,
}

impl Session {
    /// Create a new session, resolving `{target}` placeholders in the
    /// objective and custom instruction
    pub fn new(params: CreateSession) -> Self {
        let now = Utc::now();
        let objective = resolve_target_placeholder(&params.objective, &params.target);
        let custom_instruction = params
            .custom_instruction
            .as_deref()
            .map(|p| resolve_target_placeholder(p, &params.target));

        Self {
            id: Uuid::new_v4(),
            name: params.name,
            target: params.target,
            objective,
            custom_instruction,
            model: params.model,
            status: SessionStatus::Running,
            created_at: now,
            last_activity: now,
            logs: Vec::new(),
            artifacts: Vec::new(),
            reports: Vec::new(),
            has_booted: false,
            has_auto_started: false,
        }
    }

    /// Update the last-activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Look up a log entry by id
    pub fn entry(&self, entry_id: Uuid) -> Option<&LogEntry> {
        self.logs.iter().find(|e| e.id == entry_id)
    }

    /// Whether an artifact with this filename already exists
    pub fn has_artifact(&self, filename: &str) -> bool {
        self.artifacts.iter().any(|a| a.filename == filename)
    }
}

/// Replace `{target}` (case-insensitive) with the session target
pub fn resolve_target_placeholder(text: &str, target: &str) -> String {
    // Building the regex cannot fail for a literal pattern
    static PATTERN: &str = r"(?i)\{target\}";
    match regex::Regex::new(PATTERN) {
        Ok(re) => re.replace_all(text, target).into_owned(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> CreateSession {
        CreateSession {
            name: "Web App Audit".to_string(),
            target: "192.168.1.5".to_string(),
            objective: "Scan {target} for open ports".to_string(),
            custom_instruction: Some("Focus on {TARGET} only".to_string()),
            model: "gemini-2.5-flash".to_string(),
        }
    }

    #[test]
    fn test_session_new_resolves_placeholders() {
        let session = Session::new(sample_params());
        assert_eq!(session.objective, "Scan 192.168.1.5 for open ports");
        assert_eq!(
            session.custom_instruction.as_deref(),
            Some("Focus on 192.168.1.5 only")
        );
    }

    #[test]
    fn test_session_new_defaults() {
        let session = Session::new(sample_params());
        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.logs.is_empty());
        assert!(session.artifacts.is_empty());
        assert!(session.reports.is_empty());
        assert!(!session.has_booted);
        assert!(!session.has_auto_started);
    }

    #[test]
    fn test_session_touch() {
        let mut session = Session::new(sample_params());
        let before = session.last_activity;
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.touch();
        assert!(session.last_activity >= before);
    }

    #[test]
    fn test_session_has_artifact() {
        let mut session = Session::new(sample_params());
        assert!(!session.has_artifact("scan.txt"));
        session.artifacts.push(Artifact::new("scan.txt", "text", "data"));
        assert!(session.has_artifact("scan.txt"));
    }

    #[test]
    fn test_log_entry_new() {
        let entry = LogEntry::new(Sender::User, "run nmap");
        assert_eq!(entry.sender, Sender::User);
        assert_eq!(entry.content, "run nmap");
        assert!(!entry.is_error);
    }

    #[test]
    fn test_log_entry_error() {
        let entry = LogEntry::error("quota exceeded");
        assert_eq!(entry.sender, Sender::System);
        assert!(entry.is_error);
    }

    #[test]
    fn test_log_entry_with_content_keeps_identity() {
        let entry = LogEntry::new(Sender::Agent, "");
        let updated = entry.with_content("partial output");
        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.timestamp, entry.timestamp);
        assert_eq!(updated.content, "partial output");
        // Original value is untouched
        assert_eq!(entry.content, "");
    }

    #[test]
    fn test_artifact_size_is_byte_length() {
        let artifact = Artifact::new("notes.txt", "text", "héllo");
        assert_eq!(artifact.size, "héllo".len());
        assert_eq!(artifact.size, 6);
    }

    #[test]
    fn test_report_kind_from_str() {
        assert_eq!("executive".parse::<ReportKind>(), Ok(ReportKind::Executive));
        assert_eq!("Technical".parse::<ReportKind>(), Ok(ReportKind::Technical));
        assert_eq!("FULL".parse::<ReportKind>(), Ok(ReportKind::Full));
        assert!("summary".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_report_kind_label() {
        assert_eq!(ReportKind::Executive.label(), "EXECUTIVE");
        assert_eq!(ReportKind::Full.title_prefix(), "Full");
    }

    #[test]
    fn test_sender_serialization() {
        assert_eq!(serde_json::to_string(&Sender::Agent).unwrap(), "\"agent\"");
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Running).unwrap(),
            "\"RUNNING\""
        );
    }

    #[test]
    fn test_session_round_trip() {
        let mut session = Session::new(sample_params());
        session.logs.push(LogEntry::new(Sender::User, "whoami"));
        session.artifacts.push(Artifact::new("a.txt", "text", "x"));

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.logs.len(), 1);
        assert_eq!(back.artifacts.len(), 1);
        assert_eq!(back.status, SessionStatus::Running);
    }

    #[test]
    fn test_resolve_target_placeholder_mixed_case() {
        assert_eq!(
            resolve_target_placeholder("hit {Target} and {TARGET}", "10.0.0.1"),
            "hit 10.0.0.1 and 10.0.0.1"
        );
    }
}
