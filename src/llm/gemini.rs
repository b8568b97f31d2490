// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Google Gemini API provider implementation
//!
//! Implements both provider traits against the generative language API.
//! Shell exchanges use the SSE streaming endpoint; reports use the
//! one-shot endpoint with the pro model.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, RedshellError, Result};
use crate::llm::prompts;
use crate::llm::provider::{
    ModelInfo, ReportProvider, ReportRequest, ShellProvider, ShellRequest, ShellStream,
};
use crate::session::model::Sender;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Temperature for shell simulation; low, but enough for auto-pilot
/// reasoning to vary
const SHELL_TEMPERATURE: f32 = 0.2;

/// Temperature for report synthesis
const REPORT_TEMPERATURE: f32 = 0.3;

/// Model used for reports regardless of the session model; summarization
/// needs the stronger reasoner
const REPORT_MODEL: &str = "gemini-3-pro-preview";

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Map session-facing model names to wire model strings. Simulated
    /// third-party personas run on the pro model; unknown names fall
    /// back to flash.
    fn resolve_model(model: &str) -> &str {
        match model {
            "gemini-2.5-flash" => "gemini-2.5-flash",
            "gemini-3-pro-preview" => "gemini-3-pro-preview",
            "claude-3-5-sonnet-sim" => "gemini-3-pro-preview",
            _ => "gemini-2.5-flash",
        }
    }

    /// Convert transcript entries to wire contents, appending the
    /// outbound message as the final user turn
    fn build_contents(request: &ShellRequest) -> Vec<GeminiContent> {
        let mut contents: Vec<GeminiContent> = request
            .wire_history()
            .filter(|e| !e.content.is_empty())
            .map(|e| {
                let role = match e.sender {
                    Sender::Agent => "model",
                    _ => "user",
                };
                GeminiContent {
                    role: role.to_string(),
                    parts: vec![GeminiPart {
                        text: e.content.clone(),
                    }],
                }
            })
            .collect();

        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: request.message.clone(),
            }],
        });

        contents
    }

    /// Parse an error response body
    fn parse_error(&self, status: u16, body: &str) -> RedshellError {
        if let Ok(error_response) = serde_json::from_str::<GoogleErrorResponse>(body) {
            let err = match error_response.error.status.as_str() {
                "UNAUTHENTICATED" | "PERMISSION_DENIED" => ProviderError::AuthenticationFailed,
                "RESOURCE_EXHAUSTED" => ProviderError::RateLimited(10),
                "NOT_FOUND" => ProviderError::ModelNotFound(error_response.error.message),
                _ => ProviderError::ServerError {
                    status,
                    message: error_response.error.message,
                },
            };
            RedshellError::Provider(err)
        } else {
            RedshellError::Provider(ProviderError::ServerError {
                status,
                message: body.to_string(),
            })
        }
    }
}

#[async_trait]
impl ShellProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gemini-2.5-flash".to_string(),
                display_name: "Gemini 2.5 Flash".to_string(),
            },
            ModelInfo {
                id: "gemini-3-pro-preview".to_string(),
                display_name: "Gemini 3 Pro (Preview)".to_string(),
            },
            ModelInfo {
                id: "claude-3-5-sonnet-sim".to_string(),
                display_name: "Claude 3.5 Sonnet (Simulated)".to_string(),
            },
        ]
    }

    async fn stream_shell(&self, request: ShellRequest) -> Result<ShellStream> {
        let model = Self::resolve_model(&request.model);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        );

        let body = GeminiRequest {
            contents: Self::build_contents(&request),
            system_instruction: GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompts::build_shell_instruction(
                        &request.target,
                        &request.objective,
                        request.custom_instruction.as_deref(),
                    ),
                }],
            },
            generation_config: GenerationConfig {
                temperature: SHELL_TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body));
        }

        let byte_stream = response.bytes_stream();

        let fragment_stream = byte_stream
            .map(|result| {
                result.map_err(|e| {
                    RedshellError::Provider(ProviderError::StreamError(e.to_string()))
                })
            })
            .scan(String::new(), |buffer, result| {
                let chunk = match result {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                    Err(e) => return futures::future::ready(Some(vec![Err(e)])),
                };

                buffer.push_str(&chunk);

                let mut fragments = Vec::new();

                // Parse SSE events from buffer
                while let Some(pos) = buffer.find("\n\n") {
                    let event_str = buffer[..pos].to_string();
                    *buffer = buffer[pos + 2..].to_string();

                    if let Some(text) = parse_sse_fragment(&event_str) {
                        if !text.is_empty() {
                            fragments.push(Ok(text));
                        }
                    }
                }

                futures::future::ready(Some(fragments))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(fragment_stream))
    }
}

#[async_trait]
impl ReportProvider for GeminiProvider {
    async fn generate_report(&self, request: ReportRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, REPORT_MODEL);

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompts::build_report_prompt(
                        request.kind,
                        &request.target,
                        &request.objective,
                        &request.evidence,
                    ),
                }],
            }],
            system_instruction: GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompts::REPORT_SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: REPORT_TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body));
        }

        let api_response: GeminiResponse = response.json().await?;
        let text = api_response.joined_text();
        if text.is_empty() {
            return Err(RedshellError::Provider(ProviderError::InvalidResponse(
                "empty report response".to_string(),
            )));
        }
        Ok(text)
    }
}

/// Extract the text payload from one Server-Sent Event
fn parse_sse_fragment(event_str: &str) -> Option<String> {
    let mut data = String::new();

    for line in event_str.lines() {
        if let Some(rest) = line.strip_prefix("data: ") {
            data.push_str(rest);
        }
    }

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let parsed: GeminiResponse = serde_json::from_str(&data).ok()?;
    Some(parsed.joined_text())
}

// ===== Wire types =====

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    fn joined_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}
