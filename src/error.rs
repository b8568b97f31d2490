// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Error types for Redshell
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for Redshell operations
#[derive(Error, Debug)]
pub enum RedshellError {
    /// Provider-related errors (streaming or report backends)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Session errors (unknown id, illegal state transition)
    #[error("Session error: {0}")]
    Session(String),

    /// Aggregator handle misuse; indicates a cancellation race upstream
    #[error("Unknown stream handle: {0}")]
    UnknownStreamHandle(u64),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report synthesis errors
    #[error("Report error: {0}")]
    Report(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Provider-specific error types
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Stream cancelled by the operator; maps to the Aborted transition,
    /// never surfaced as a failure
    #[error("Stream cancelled")]
    Cancelled,

    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

impl RedshellError {
    /// Whether this error represents an operator-initiated abort rather
    /// than a genuine failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RedshellError::Provider(ProviderError::Cancelled))
    }
}

/// Result type alias for Redshell operations
pub type Result<T> = std::result::Result<T, RedshellError>;
