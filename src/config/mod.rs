// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Configuration module for Redshell
//!
//! Handles loading, saving, and managing user settings.

pub mod settings;

pub use settings::*;
