pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_config_from_str, CONFIG_ENV_VAR};
pub use schema::{
    ApiUser, AssistConfig, AuthConfig, Config, DatabaseConfig, GenerationServiceConfig, LogFormat,
    LoggingConfig, ServerConfig, StorageBackend, StorageConfig,
};
