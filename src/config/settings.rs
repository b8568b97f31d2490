// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Settings management for Redshell
//!
//! Handles loading and saving settings from ~/.redshell/settings.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RedshellError, Result};

/// Main settings structure, stored in ~/.redshell/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Gemini backend configuration
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// General shell persona settings
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Gemini-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,

    /// Default model for new sessions
    #[serde(default = "default_gemini_model")]
    pub default_model: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_gemini_api_key_env(),
            default_model: default_gemini_model(),
            base_url: None,
        }
    }
}

/// Shell persona configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Simulated login user
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Simulated shell binary
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            shell: default_shell(),
        }
    }
}

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::redshell_home().join("settings.json")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the redshell home directory (~/.redshell or $REDSHELL_HOME).
    pub fn redshell_home() -> PathBuf {
        if let Ok(home) = std::env::var("REDSHELL_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".redshell")
    }

    /// Path to the persisted session collection.
    pub fn sessions_path() -> PathBuf {
        Self::redshell_home().join("sessions.json")
    }

    /// Ensure the home directory exists.
    pub fn ensure_directories() -> Result<()> {
        std::fs::create_dir_all(Self::redshell_home())?;
        Ok(())
    }

    /// Resolve the Gemini API key: direct value first, then the
    /// configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.gemini.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        match std::env::var(&self.gemini.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(RedshellError::Config(format!(
                "no API key: set gemini.api_key in settings.json or export {}",
                self.gemini.api_key_env
            ))),
        }
    }
}

// Default value functions
fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_user_name() -> String {
    "root".to_string()
}

fn default_shell() -> String {
    "zsh".to_string()
}
