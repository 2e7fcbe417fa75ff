use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::Config;
use crate::error::AppError;

const SUPPORT_CONTEXT: &str = "You are a helpful customer support agent for a parcel \
    delivery company. Answer politely and concisely. If the user asks about tracking, \
    explain that they can enter their tracking ID (it starts with NV-) on the home page. \
    User query: ";

const OFFLINE_REPLY: &str = "Our assistant is offline right now. You can follow your \
    parcel by entering its tracking ID (it starts with NV-) on the home page.";

/// Free-text support replies from an external text-generation provider.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn reply(&self, message: &str) -> Result<String, AppError>;
}

/// Used when no provider key is configured.
#[derive(Debug, Default)]
pub struct OfflineAssistant;

#[async_trait]
impl Assistant for OfflineAssistant {
    async fn reply(&self, _message: &str) -> Result<String, AppError> {
        Ok(OFFLINE_REPLY.to_string())
    }
}

pub struct GeminiAssistant {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiAssistant {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Assistant for GeminiAssistant {
    async fn reply(&self, message: &str) -> Result<String, AppError> {
        let prompt = format!("{SUPPORT_CONTEXT}{message}");
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "assistant provider unreachable");
                AppError::Upstream("failed to communicate with AI service".to_string())
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "assistant provider returned an error");
            return Err(AppError::Upstream(
                "failed to communicate with AI service".to_string(),
            ));
        }

        let generated: GenerateResponse = response.json().await.map_err(|err| {
            error!(error = %err, "assistant provider sent an unreadable response");
            AppError::Upstream("failed to communicate with AI service".to_string())
        })?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Upstream("AI service returned no answer".to_string()));
        }

        Ok(text)
    }
}

/// Picks the provider-backed assistant when a key is configured.
pub fn from_config(config: &Config) -> Result<Box<dyn Assistant>, AppError> {
    match &config.assistant_api_key {
        Some(key) => Ok(Box::new(GeminiAssistant::new(
            &config.assistant_endpoint,
            &config.assistant_model,
            key,
        )?)),
        None => Ok(Box::new(OfflineAssistant)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Assistant, OfflineAssistant};

    #[tokio::test]
    async fn offline_assistant_points_to_tracking() {
        let reply = OfflineAssistant.reply("where is my parcel?").await.unwrap();
        assert!(reply.contains("tracking ID"));
    }
}
