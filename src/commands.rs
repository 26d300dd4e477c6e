use anyhow::{Context, Result};
use console::style;
use tracing::info;

use crate::chat::{ChatEngine, Session, repl};
use crate::config::settings::{GOOGLE_API_KEY_VAR, PINECONE_API_KEY_VAR};
use crate::config::{Config, StoreBackendKind};
use crate::embeddings::EmbeddingClient;
use crate::gemini::GeminiClient;
use crate::ingest::Ingestor;
use crate::store::{self, VectorStore};

/// Run the ingestion pipeline over the configured document directory
#[inline]
pub async fn run_ingest() -> Result<()> {
    let config = Config::load()?;

    println!(
        "📥 Ingesting documents from {} into '{}' ({} backend)",
        config.data_dir.display(),
        config.store.collection_name(),
        config.store.backend
    );

    let mut ingestor = Ingestor::new(config)
        .await
        .context("Failed to initialize ingestion pipeline")?;

    let report = ingestor.run().await.context("Ingestion run failed")?;

    println!("✅ Success! Your documents are in the knowledge base.");
    println!("  Documents read: {}", report.documents);
    println!("  Pages extracted: {}", report.pages);
    println!("  Chunks embedded: {}", report.embeddings);
    println!(
        "  Collection size: {} chunks",
        ingestor.collection_count().await?
    );

    Ok(())
}

/// Start the interactive chat session
#[inline]
pub async fn run_chat() -> Result<()> {
    let config = Config::load()?;

    info!("Initializing chat engine");
    let engine = ChatEngine::new(&config)
        .await
        .context("Engine initialization failed")?;

    let mut session = Session::new();
    repl::run(&engine, &mut session).await
}

/// Show credential, provider, and knowledge-base health
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("📊 SOP Assistant Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔑 Credentials:");
    print_credential(GOOGLE_API_KEY_VAR, true);
    print_credential(
        PINECONE_API_KEY_VAR,
        config.store.backend == StoreBackendKind::Pinecone,
    );

    println!();
    println!("🧠 Embedding Provider ({}):", config.embedding.provider);
    match EmbeddingClient::from_config(&config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!("   ✅ Reachable");
                println!("   📋 Model: {}", client.model_id());
                println!("   🔢 Dimension: {}", config.embedding.dimension);
            }
            Err(e) => {
                println!("   ⚠️  Configured but unreachable - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Not usable - {}", e);
        }
    }

    println!();
    println!("🗄️  Knowledge Base ({}):", config.store.backend);
    match store::open_store(&config).await {
        Ok(store_handle) => {
            println!("   ✅ Collection: {}", store_handle.collection_name());
            println!("   📂 Location: {}", store_handle.location());
            match store_handle.count().await {
                Ok(0) => {
                    println!("   ⚠️  Empty - run `sop-assistant ingest` first");
                }
                Ok(count) => {
                    println!("   📄 Chunks: {}", count);
                }
                Err(e) => {
                    println!("   ❌ Failed to count chunks - {}", e);
                }
            }
            match store_handle.manifest().await {
                Ok(Some(manifest)) => {
                    println!(
                        "   🏷️  Ingested with: {} ({} dims)",
                        manifest.embedding_model, manifest.dimension
                    );
                }
                Ok(None) => {
                    println!("   🏷️  Ingestion provenance: not recorded");
                }
                Err(e) => {
                    println!("   ❌ Failed to read manifest - {}", e);
                }
            }
        }
        Err(e) => {
            println!("   ❌ Failed to open - {}", e);
        }
    }

    println!();
    println!("🤖 Generation Model:");
    match Config::google_api_key() {
        Ok(api_key) => {
            let llm = GeminiClient::new(&config.gemini, api_key);
            match llm.resolve_model(&config.gemini) {
                Ok(model) => {
                    if model == config.gemini.model {
                        println!("   ✅ {}", model);
                    } else {
                        println!("   ⚠️  {} (fallback; {} unavailable)", model, config.gemini.model);
                    }
                }
                Err(e) => {
                    println!("   ❌ {}", e);
                }
            }
        }
        Err(_) => {
            println!("   ⏭️  Skipped ({} not set)", GOOGLE_API_KEY_VAR);
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'sop-assistant config' to adjust backends and models");
    println!("   • Use 'sop-assistant ingest' to (re)build the knowledge base");
    println!("   • Use 'sop-assistant chat' to start a conversation");

    Ok(())
}

fn print_credential(var: &str, required: bool) {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            println!("   ✅ {}: {}", var, mask_key(&value));
        }
        _ if required => {
            println!("   ❌ {}: not set", style(var).bold());
        }
        _ => {
            println!("   ⏭️  {}: not set (not needed for this backend)", var);
        }
    }
}

/// First few characters only, the rest masked.
fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    format!("{}********", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_key_keeps_a_short_prefix() {
        assert_eq!(mask_key("AIzaSyExample123"), "AIzaS********");
        assert_eq!(mask_key("abc"), "abc********");
    }
}
