// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Artifact extraction from finished agent messages
//!
//! Agent output embeds file-like artifacts in fenced regions whose
//! opening line carries an optional type prefix and a mandatory filename
//! token:
//!
//! ````text
//! ```python:exploit.py
//! print("hi")
//! ```
//! ````
//!
//! The wire format is fixed: ```` ```[type:]filename ```` opens a fence
//! and a line that is exactly ```` ``` ```` closes it. Fences are
//! non-overlapping and never nested. Malformed fences (no valid filename
//! token) and unterminated fences are skipped silently; extraction never
//! fails on any input.

use std::collections::HashSet;

use crate::session::model::Artifact;

/// Scan a completed message for fenced artifacts, in document order
///
/// Within one message the first occurrence of a filename wins; later
/// duplicates are dropped. Deduplication against a session's existing
/// artifacts happens at merge time in the store.
pub fn extract_artifacts(text: &str) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    // None while scanning; Some while inside a fence. A fence with an
    // unparseable header is still consumed (header None) so its body can
    // never open a nested fence.
    let mut fence: Option<(Option<FenceHeader>, Vec<&str>)> = None;

    for line in text.split('\n') {
        match fence.as_mut() {
            None => {
                if let Some(rest) = line.trim().strip_prefix("```") {
                    fence = Some((parse_fence_header(rest), Vec::new()));
                }
            }
            Some((header, body)) => {
                if line.trim() == "```" {
                    if let Some(h) = header.take() {
                        if seen.insert(h.filename.clone()) {
                            let content = trim_blank_lines(body);
                            artifacts.push(Artifact::new(h.filename, h.type_tag, content));
                        }
                    }
                    fence = None;
                } else {
                    body.push(line);
                }
            }
        }
    }

    // An open fence at end of input is malformed; the collected body is
    // dropped.
    artifacts
}

/// Parsed `[type:]filename` fence header
#[derive(Debug, Clone, PartialEq, Eq)]
struct FenceHeader {
    type_tag: String,
    filename: String,
}

/// Parse the remainder of a fence-open line after the backticks
///
/// Returns `None` for malformed headers: empty, bad filename charset, or
/// a type prefix that is not a plain word.
fn parse_fence_header(rest: &str) -> Option<FenceHeader> {
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (type_tag, filename) = match rest.split_once(':') {
        Some((tag, name)) => (tag.trim(), name.trim()),
        None => ("text", rest),
    };

    if type_tag.is_empty() || !type_tag.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    if filename.is_empty() || !filename.chars().all(is_filename_char) {
        return None;
    }

    Some(FenceHeader {
        type_tag: type_tag.to_string(),
        filename: filename.to_string(),
    })
}

fn is_filename_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Join body lines, dropping leading and trailing blank lines
fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(start);
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_artifact() {
        // Scenario A from the interaction engine contract
        let text = "```text:nmap_scan.txt\nPORT STATE\n80 open\n```";
        let artifacts = extract_artifacts(text);

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].filename, "nmap_scan.txt");
        assert_eq!(artifacts[0].artifact_type, "text");
        assert_eq!(artifacts[0].content, "PORT STATE\n80 open");
        assert_eq!(artifacts[0].size, "PORT STATE\n80 open".len());
    }

    #[test]
    fn test_type_tag_defaults_to_text() {
        let text = "```results.log\nline\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].artifact_type, "text");
        assert_eq!(artifacts[0].filename, "results.log");
    }

    #[test]
    fn test_typed_artifact() {
        let text = "```python:exploit.py\nprint('x')\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts[0].artifact_type, "python");
        assert_eq!(artifacts[0].filename, "exploit.py");
    }

    #[test]
    fn test_spaces_around_colon_tolerated() {
        let text = "```json : creds.json\n{}\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].artifact_type, "json");
        assert_eq!(artifacts[0].filename, "creds.json");
    }

    #[test]
    fn test_multiple_artifacts_in_document_order() {
        let text = "intro\n```text:a.txt\nA\n```\nmiddle\n```py:b.py\nB\n```\n";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].filename, "a.txt");
        assert_eq!(artifacts[1].filename, "b.py");
    }

    #[test]
    fn test_body_blank_lines_trimmed() {
        let text = "```text:out.txt\n\n\ndata line\n\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts[0].content, "data line");
        assert_eq!(artifacts[0].size, "data line".len());
    }

    #[test]
    fn test_interior_blank_lines_kept() {
        let text = "```text:out.txt\nfirst\n\nsecond\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts[0].content, "first\n\nsecond");
    }

    #[test]
    fn test_empty_body_artifact() {
        let text = "```text:empty.txt\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].content, "");
        assert_eq!(artifacts[0].size, 0);
    }

    #[test]
    fn test_malformed_bare_fence_skipped() {
        let text = "```\njust code\n```";
        assert!(extract_artifacts(text).is_empty());
    }

    #[test]
    fn test_malformed_filename_with_spaces_skipped() {
        let text = "```rust fn main\ncode\n```";
        assert!(extract_artifacts(text).is_empty());
    }

    #[test]
    fn test_unterminated_fence_skipped() {
        // Scenario D: extraction skips what the block parser still renders
        let text = "```text:x.txt\nhello";
        assert!(extract_artifacts(text).is_empty());
    }

    #[test]
    fn test_malformed_fence_body_not_reopened() {
        // The close of a malformed fence must not start a new fence
        let text = "```\n```text:real.txt\nnot captured\n```";
        let artifacts = extract_artifacts(text);
        // The bare ``` opens a malformed fence, the header line closes
        // nothing (it is body), so only the text after the next close
        // could possibly match; here nothing valid remains.
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_in_message_dedup_first_wins() {
        let text =
            "```text:dup.txt\nfirst\n```\n```text:dup.txt\nsecond\n```\n```text:other.txt\nx\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].filename, "dup.txt");
        assert_eq!(artifacts[0].content, "first");
        assert_eq!(artifacts[1].filename, "other.txt");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "```a.txt\n1\n```\n```b.txt\n2\n```";
        let first: Vec<_> = extract_artifacts(text)
            .into_iter()
            .map(|a| (a.filename, a.content))
            .collect();
        let second: Vec<_> = extract_artifacts(text)
            .into_iter()
            .map(|a| (a.filename, a.content))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_artifacts("").is_empty());
    }

    #[test]
    fn test_size_counts_bytes_not_chars() {
        let text = "```text:utf8.txt\nhéllo\n```";
        let artifacts = extract_artifacts(text);
        assert_eq!(artifacts[0].size, 6);
    }

    #[test]
    fn test_parse_fence_header_variants() {
        assert_eq!(
            parse_fence_header("text:scan.txt"),
            Some(FenceHeader {
                type_tag: "text".to_string(),
                filename: "scan.txt".to_string()
            })
        );
        assert_eq!(
            parse_fence_header("notes-v2.md"),
            Some(FenceHeader {
                type_tag: "text".to_string(),
                filename: "notes-v2.md".to_string()
            })
        );
        assert!(parse_fence_header("").is_none());
        assert!(parse_fence_header("   ").is_none());
        assert!(parse_fence_header("bad type:file.txt").is_none());
        assert!(parse_fence_header("text:").is_none());
        assert!(parse_fence_header(":file.txt").is_none());
        assert!(parse_fence_header("text:has space.txt").is_none());
    }

    #[test]
    fn test_trim_blank_lines() {
        assert_eq!(trim_blank_lines(&["", "a", "b", ""]), "a\nb");
        assert_eq!(trim_blank_lines(&["", "  ", ""]), "");
        assert_eq!(trim_blank_lines(&[]), "");
        assert_eq!(trim_blank_lines(&["only"]), "only");
    }
}
