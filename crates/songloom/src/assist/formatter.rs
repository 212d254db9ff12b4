//! Caption formatting through an external helper script.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{AssistError, CaptionFormatter, FormatRequest, FormattedCaption};
use crate::config::AssistConfig;
use crate::secrets::expand_home;

/// Runs `<python> <script> --caption ... --json` and parses its stdout.
#[derive(Debug, Clone)]
pub struct ScriptCaptionFormatter {
    python: String,
    script: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ScriptCaptionFormatter {
    pub fn new(python: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
            working_dir: None,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `None` when no formatting script is configured.
    pub fn from_config(config: &AssistConfig) -> Option<Self> {
        let script = config.format_script.as_deref()?;
        let mut formatter = Self::new(config.python.clone(), expand_home(script))
            .with_timeout(Duration::from_secs(config.timeout_secs));
        if let Some(dir) = &config.working_dir {
            formatter = formatter.with_working_dir(expand_home(dir));
        }
        Some(formatter)
    }

    fn args(&self, request: &FormatRequest) -> Vec<String> {
        let mut args = vec![
            self.script.to_string_lossy().to_string(),
            "--caption".to_string(),
            request.caption.clone(),
            "--json".to_string(),
        ];

        let mut push = |flag: &str, value: String| {
            args.push(flag.to_string());
            args.push(value);
        };
        if let Some(lyrics) = request.lyrics.as_deref().filter(|l| !l.is_empty()) {
            push("--lyrics", lyrics.to_string());
        }
        if let Some(bpm) = request.bpm.filter(|b| *b > 0) {
            push("--bpm", bpm.to_string());
        }
        // The helper takes whole seconds.
        if let Some(duration) = request.duration.filter(|d| *d > 0.0) {
            push("--duration", (duration.round() as i64).to_string());
        }
        if let Some(key) = request.key_scale.as_deref().filter(|k| !k.is_empty()) {
            push("--key-scale", key.to_string());
        }
        if let Some(sig) = request.time_signature.as_deref().filter(|s| !s.is_empty()) {
            push("--time-signature", sig.to_string());
        }
        if let Some(temperature) = request.temperature {
            push("--temperature", temperature.to_string());
        }
        if let Some(top_k) = request.top_k.filter(|k| *k > 0) {
            push("--top-k", top_k.to_string());
        }
        if let Some(top_p) = request.top_p {
            push("--top-p", top_p.to_string());
        }
        args
    }
}

#[async_trait]
impl CaptionFormatter for ScriptCaptionFormatter {
    async fn format_caption(&self, request: FormatRequest) -> Result<FormattedCaption, AssistError> {
        request.validate()?;

        let mut cmd = Command::new(&self.python);
        cmd.args(self.args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir).env("ACESTEP_PATH", dir);
        }

        tracing::debug!(script = %self.script.display(), "Running caption formatter");
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AssistError::Timeout(self.timeout))?
            .map_err(AssistError::Spawn)?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(status = %output.status, "Caption formatter failed");
            return Err(AssistError::Failed(if stderr.is_empty() {
                "Format failed".to_string()
            } else {
                stderr
            }));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| AssistError::Parse(e.to_string()))
    }
}
