// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Parsing module for Redshell
//!
//! Line-oriented classification of agent output and artifact mining
//! from fenced blocks.

pub mod artifacts;
pub mod blocks;

pub use artifacts::extract_artifacts;
pub use blocks::{parse_blocks, strip_ansi, ParsedBlock};
