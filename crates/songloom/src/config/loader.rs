use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::{Config, StorageBackend};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV_VAR: &str = "SONGLOOM_CONFIG";

/// `~/.songloom/songloom.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".songloom").join("songloom.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn require_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(invalid(format!(
            "{} must use http or https, got '{}'",
            field,
            url.scheme()
        ))),
        Err(e) => Err(invalid(format!("{} is not a valid URL: {}", field, e))),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    config
        .server
        .bind
        .parse::<std::net::SocketAddr>()
        .map_err(|e| invalid(format!("server.bind '{}': {}", config.server.bind, e)))?;

    require_http_url("generation.baseUrl", &config.generation.base_url)?;
    require_http_url("assist.ollamaUrl", &config.assist.ollama_url)?;

    if config.storage.backend == StorageBackend::Object {
        let storage = &config.storage;
        for (field, value) in [
            ("storage.endpoint", &storage.endpoint),
            ("storage.bucket", &storage.bucket),
            ("storage.publicBaseUrl", &storage.public_base_url),
        ] {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(invalid(format!(
                    "{} is required for the object backend",
                    field
                )));
            }
        }
        if let Some(endpoint) = &storage.endpoint {
            require_http_url("storage.endpoint", endpoint)?;
        }
    }

    let mut user_ids = HashSet::new();
    for user in &config.auth.users {
        if !user_ids.insert(user.user_id.as_str()) {
            return Err(invalid(format!("Duplicate auth user '{}'", user.user_id)));
        }
        if !user.token_source().is_configured() {
            return Err(invalid(format!(
                "Auth user '{}' needs one of token, tokenFile or tokenEnvVar",
                user.user_id
            )));
        }
    }

    Ok(())
}
