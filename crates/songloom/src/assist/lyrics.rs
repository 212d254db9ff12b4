//! Lyrics drafting through a local Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AssistError, GeneratedLyrics, LyricsRequest, LyricsWriter};
use crate::config::AssistConfig;

pub const DEFAULT_MODEL: &str = "gemma3:4b";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    eval_count: u64,
}

pub struct OllamaLyricsWriter {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaLyricsWriter {
    pub fn new(base_url: &str, model: &str) -> Result<Self, AssistError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &AssistConfig) -> Result<Self, AssistError> {
        Self::new(&config.ollama_url, &config.ollama_model)
    }
}

#[async_trait]
impl LyricsWriter for OllamaLyricsWriter {
    async fn generate_lyrics(&self, request: LyricsRequest) -> Result<GeneratedLyrics, AssistError> {
        request.validate()?;

        let model = request.model.as_deref().unwrap_or(&self.model);
        let payload = GeneratePayload {
            model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                num_predict: request.max_tokens.filter(|n| *n > 0),
            },
            system: request.system_prompt.as_deref().filter(|s| !s.is_empty()),
        };

        tracing::debug!(model, "Requesting lyrics");
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistError::Failed(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AssistError::Parse(e.to_string()))?;

        Ok(GeneratedLyrics {
            success: true,
            response: body.response,
            model: body.model.unwrap_or_else(|| model.to_string()),
            eval_count: body.eval_count,
        })
    }
}
