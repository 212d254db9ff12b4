//! Builders for request parameters and scripted remote outcomes.

#![allow(dead_code)]

use songloom::client::RemoteStatus;
use songloom::generation::{GenerationParams, GenerationResult, JobStatus};

/// Builder for `GenerationParams`, starting from a valid simple-mode request.
pub struct ParamsBuilder {
    params: GenerationParams,
}

impl ParamsBuilder {
    pub fn simple(description: &str) -> Self {
        Self {
            params: GenerationParams {
                song_description: Some(description.to_string()),
                ..Default::default()
            },
        }
    }

    /// Custom mode with nothing set yet.
    pub fn custom() -> Self {
        Self {
            params: GenerationParams {
                custom_mode: true,
                ..Default::default()
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.params.title = Some(title.to_string());
        self
    }

    pub fn style(mut self, style: &str) -> Self {
        self.params.style = Some(style.to_string());
        self
    }

    pub fn lyrics(mut self, lyrics: &str) -> Self {
        self.params.lyrics = Some(lyrics.to_string());
        self
    }

    pub fn instrumental(mut self) -> Self {
        self.params.instrumental = true;
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.params.duration = Some(seconds);
        self
    }

    pub fn bpm(mut self, bpm: i64) -> Self {
        self.params.bpm = Some(bpm);
        self
    }

    pub fn key_scale(mut self, key: &str) -> Self {
        self.params.key_scale = Some(key.to_string());
        self
    }

    pub fn build(self) -> GenerationParams {
        self.params
    }
}

/// A remote URL for an asset produced by the scripted service.
pub fn asset_url(name: &str) -> String {
    format!("http://gen.test/v1/audio/{}", name)
}

pub fn result_with(urls: &[String]) -> GenerationResult {
    GenerationResult {
        audio_urls: urls.to_vec(),
        ..Default::default()
    }
}

pub fn running(queue_position: Option<u32>, eta_seconds: Option<f64>) -> RemoteStatus {
    RemoteStatus {
        queue_position,
        eta_seconds,
        ..RemoteStatus::of(JobStatus::Running)
    }
}

pub fn succeeded(result: GenerationResult) -> RemoteStatus {
    RemoteStatus {
        result: Some(result),
        ..RemoteStatus::of(JobStatus::Succeeded)
    }
}

pub fn failed(error: Option<&str>) -> RemoteStatus {
    RemoteStatus {
        error: error.map(str::to_string),
        ..RemoteStatus::of(JobStatus::Failed)
    }
}
