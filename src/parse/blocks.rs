// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Line-oriented block classification for transcript rendering
//!
//! Splits raw agent output into an ordered sequence of [`ParsedBlock`]s:
//! plain text, fenced code, or reasoning-trace ("thinking") lines. The
//! parser is a pure function of the input text, never panics, and for
//! fence-free input the concatenated block contents reproduce the input
//! byte for byte (fence marker lines are consumed, not emitted).
//!
//! Blocks are transient rendering units; they are recomputed from entry
//! content on demand and never persisted.

use std::sync::OnceLock;

use regex::Regex;

/// Line prefixes that mark an agent's exposed reasoning trace
const THINKING_PREFIXES: [&str; 4] = ["CLAUDE THINKING:", "> THOUGHT:", "[GEMINI]", "[ANALYSIS]"];

/// A typed rendering unit produced by [`parse_blocks`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedBlock {
    /// Plain output
    Text { content: String },
    /// Fenced region; `language` is the fence header tag ("text" if none)
    Code { content: String, language: String },
    /// Reasoning-trace lines
    Thinking { content: String },
}

impl ParsedBlock {
    /// The block's text content, regardless of kind
    pub fn content(&self) -> &str {
        match self {
            ParsedBlock::Text { content }
            | ParsedBlock::Code { content, .. }
            | ParsedBlock::Thinking { content } => content,
        }
    }
}

/// Classify `text` into an ordered sequence of blocks
pub fn parse_blocks(text: &str) -> Vec<ParsedBlock> {
    let mut blocks: Vec<ParsedBlock> = Vec::new();
    let mut current: Option<ParsedBlock> = None;
    let mut in_code = false;

    for raw in text.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);

        // Fence markers toggle code state; the marker line itself is
        // consumed and never part of any block's content.
        if line.trim_start().starts_with("```") {
            if in_code {
                flush(&mut blocks, &mut current);
                in_code = false;
            } else {
                flush(&mut blocks, &mut current);
                current = Some(ParsedBlock::Code {
                    content: String::new(),
                    language: fence_language(line),
                });
                in_code = true;
            }
            continue;
        }

        // Inside a fence every line is verbatim code, including lines
        // that would otherwise match a thinking prefix.
        if in_code {
            if let Some(ParsedBlock::Code { content, .. }) = current.as_mut() {
                content.push_str(raw);
            }
            continue;
        }

        if THINKING_PREFIXES.iter().any(|p| line.starts_with(p)) {
            match current.as_mut() {
                Some(ParsedBlock::Thinking { content }) => content.push_str(raw),
                _ => {
                    flush(&mut blocks, &mut current);
                    current = Some(ParsedBlock::Thinking {
                        content: raw.to_string(),
                    });
                }
            }
            continue;
        }

        match current.as_mut() {
            Some(ParsedBlock::Text { content }) => content.push_str(raw),
            _ => {
                flush(&mut blocks, &mut current);
                current = Some(ParsedBlock::Text {
                    content: raw.to_string(),
                });
            }
        }
    }

    // Unterminated blocks (including open fences) flush as-is.
    flush(&mut blocks, &mut current);
    blocks
}

/// Extract the language tag from a fence-open line; defaults to "text"
fn fence_language(line: &str) -> String {
    let header = line
        .trim()
        .strip_prefix("```")
        .unwrap_or_default()
        .trim();
    let starts_wordlike = header
        .chars()
        .next()
        .map(|c| c.is_alphanumeric() || c == '_')
        .unwrap_or(false);
    if starts_wordlike {
        header.to_string()
    } else {
        "text".to_string()
    }
}

fn flush(blocks: &mut Vec<ParsedBlock>, current: &mut Option<ParsedBlock>) {
    if let Some(block) = current.take() {
        blocks.push(block);
    }
}

/// Remove terminal control/escape sequences before block parsing
pub fn strip_ansi(text: &str) -> String {
    static ANSI_RE: OnceLock<Regex> = OnceLock::new();
    let re = ANSI_RE.get_or_init(|| {
        // CSI and related escape sequences; pattern mirrors the renderer's
        // pre-parse sanitizer
        Regex::new(r"[\x1b\u{9b}][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]")
            .expect("static ANSI pattern compiles")
    });
    re.replace_all(text, "").into_owned()
}
