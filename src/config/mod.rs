// Configuration management module
// Handles TOML configuration and credential lookup from the environment

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingProviderKind, GeminiConfig, LocalStoreConfig,
    OllamaConfig, PineconeConfig, StoreBackendKind, StoreConfig,
};
