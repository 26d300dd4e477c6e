use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::settings::{Config, EmbeddingProviderKind, StoreBackendKind};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 SOP Assistant Configuration").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Knowledge Base").bold().yellow());
    eprintln!("Select where embedded document chunks are stored.");
    eprintln!();
    configure_store(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("The same provider must be used for ingestion and chat.");
    eprintln!();
    configure_embedding(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Generation Model").bold().yellow());
    configure_gemini(&mut config)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Knowledge Base:").bold().yellow());
    eprintln!("  Backend: {}", style(config.store.backend).cyan());
    match config.store.backend {
        StoreBackendKind::Local => {
            eprintln!(
                "  Path: {}",
                style(config.store.local.path.display()).cyan()
            );
            eprintln!(
                "  Collection: {}",
                style(&config.store.local.collection).cyan()
            );
        }
        StoreBackendKind::Pinecone => {
            eprintln!("  Index: {}", style(&config.store.pinecone.index).cyan());
        }
    }

    eprintln!();
    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    match config.embedding.provider {
        EmbeddingProviderKind::Gemini => {
            eprintln!(
                "  Model: {}",
                style(&config.gemini.embedding_model).cyan()
            );
        }
        EmbeddingProviderKind::Ollama => {
            eprintln!("  Model: {}", style(&config.ollama.model).cyan());
            match config.ollama.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
        }
    }

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Model: {}", style(&config.gemini.model).cyan());
    eprintln!(
        "  Fallback: {}",
        style(&config.gemini.fallback_model).cyan()
    );

    eprintln!();
    eprintln!("  Data directory: {}", style(config.data_dir.display()).cyan());
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            let mut config = Config::default();
            config.base_dir = Config::config_dir()?;
            Ok(config)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_store(config: &mut Config) -> Result<()> {
    let backends = &["local", "pinecone"];
    let default_index = match config.store.backend {
        StoreBackendKind::Local => 0,
        StoreBackendKind::Pinecone => 1,
    };

    let backend_index = Select::new()
        .with_prompt("Vector store backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    if backend_index == 0 {
        config.store.backend = StoreBackendKind::Local;

        let path: String = Input::new()
            .with_prompt("Local store path")
            .default(config.store.local.path.display().to_string())
            .interact_text()?;
        config.store.local.path = path.into();

        config.store.local.collection = prompt_nonempty(
            "Collection name",
            &config.store.local.collection,
        )?;
    } else {
        config.store.backend = StoreBackendKind::Pinecone;
        config.store.pinecone.index =
            prompt_nonempty("Pinecone index name", &config.store.pinecone.index)?;
        eprintln!(
            "{}",
            style("Remember to export PINECONE_API_KEY before ingesting.").dim()
        );
    }

    Ok(())
}

fn configure_embedding(config: &mut Config) -> Result<()> {
    let providers = &["gemini", "ollama"];
    let default_index = match config.embedding.provider {
        EmbeddingProviderKind::Gemini => 0,
        EmbeddingProviderKind::Ollama => 1,
    };

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    if provider_index == 0 {
        config.embedding.provider = EmbeddingProviderKind::Gemini;
        config.gemini.embedding_model =
            prompt_nonempty("Embedding model", &config.gemini.embedding_model)?;
    } else {
        config.embedding.provider = EmbeddingProviderKind::Ollama;

        let host: String = Input::new()
            .with_prompt("Ollama host")
            .default(config.ollama.host.clone())
            .interact_text()?;
        config.ollama.host = host;

        let port: u16 = Input::new()
            .with_prompt("Ollama port")
            .default(config.ollama.port)
            .validate_with(|input: &u16| -> Result<(), &str> {
                if *input == 0 {
                    Err("Port must be greater than 0")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        config.ollama.port = port;

        config.ollama.model = prompt_nonempty("Embedding model", &config.ollama.model)?;
    }

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(config.embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;
    config.embedding.dimension = dimension;

    Ok(())
}

fn configure_gemini(config: &mut Config) -> Result<()> {
    config.gemini.model = prompt_nonempty("Preferred model", &config.gemini.model)?;
    config.gemini.fallback_model =
        prompt_nonempty("Fallback model", &config.gemini.fallback_model)?;
    Ok(())
}

fn prompt_nonempty(prompt: &str, default: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Value cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(value)
}
