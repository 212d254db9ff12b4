//! The generation parameter set submitted by the UI.
//!
//! Stored verbatim on the job row and copied onto every song it produces.
//! Fields this build does not know about survive the round trip through
//! `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GenerationError;

/// Title used when the request carries none.
pub const UNTITLED: &str = "Untitled";
/// Lyrics stored on songs generated without vocals.
pub const INSTRUMENTAL_LYRICS: &str = "[Instrumental]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Flac,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferMethod {
    Ode,
    Sde,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    #[serde(default)]
    pub custom_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocal_language: Option<String>,

    // Music parameters. Zero or negative means "let the model decide".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_scale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,

    // Diffusion settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infer_method: Option<InferMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<f64>,

    // Language model settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_cfg_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_negative_prompt: Option<String>,

    // Reference and source audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repainting_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repainting_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_cover_strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    // Guidance tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_adg: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_interval_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_interval_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_timesteps: Option<String>,

    // Chain-of-thought and scoring switches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cot_metas: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cot_caption: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cot_language: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autogen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constrained_decoding_debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_lm_batch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_scores: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_lrc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_batch_chunk_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_track_classes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_format_caption: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl GenerationParams {
    /// Rejects parameter sets that cannot produce anything.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.custom_mode {
            if !present(&self.style) && !present(&self.lyrics) && !present(&self.reference_audio_url)
            {
                return Err(GenerationError::Validation(
                    "Style, lyrics, or reference audio required for custom mode".to_string(),
                ));
            }
        } else if !present(&self.song_description) {
            return Err(GenerationError::Validation(
                "Song description required for simple mode".to_string(),
            ));
        }
        Ok(())
    }

    pub fn song_title(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => UNTITLED,
        }
    }

    pub fn song_lyrics(&self) -> &str {
        if self.instrumental {
            INSTRUMENTAL_LYRICS
        } else {
            self.lyrics.as_deref().unwrap_or_default()
        }
    }

    pub fn song_style(&self) -> &str {
        self.style.as_deref().unwrap_or_default()
    }

    pub fn requested_duration(&self) -> Option<f64> {
        self.duration.filter(|d| *d > 0.0)
    }

    pub fn requested_bpm(&self) -> Option<u32> {
        self.bpm
            .filter(|b| *b > 0)
            .and_then(|b| u32::try_from(b).ok())
    }

    pub fn requested_key_scale(&self) -> Option<&str> {
        self.key_scale.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn requested_time_signature(&self) -> Option<&str> {
        self.time_signature
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}
