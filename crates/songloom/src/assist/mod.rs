//! Optional helpers that assist the user in writing a request.
//!
//! Neither helper touches job state; they only transform text.

pub mod error;
pub mod formatter;
pub mod lyrics;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::AssistError;
pub use formatter::ScriptCaptionFormatter;
pub use lyrics::OllamaLyricsWriter;

/// Style and lyrics to be rewritten, with optional metadata constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRequest {
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub key_scale: Option<String>,
    #[serde(default)]
    pub time_signature: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
}

/// Output of the formatting helper, passed through to the caller as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormattedCaption {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub key_scale: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub time_signature: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLyrics {
    pub success: bool,
    pub response: String,
    pub model: String,
    #[serde(default)]
    pub eval_count: u64,
}

#[async_trait]
pub trait CaptionFormatter: Send + Sync {
    async fn format_caption(&self, request: FormatRequest) -> Result<FormattedCaption, AssistError>;
}

#[async_trait]
pub trait LyricsWriter: Send + Sync {
    async fn generate_lyrics(&self, request: LyricsRequest) -> Result<GeneratedLyrics, AssistError>;
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl FormatRequest {
    pub fn validate(&self) -> Result<(), AssistError> {
        if is_blank(&self.caption) {
            return Err(AssistError::Validation("Caption/style is required".to_string()));
        }
        Ok(())
    }
}

impl LyricsRequest {
    pub fn validate(&self) -> Result<(), AssistError> {
        if is_blank(&self.prompt) {
            return Err(AssistError::Validation("Prompt is required".to_string()));
        }
        Ok(())
    }
}
