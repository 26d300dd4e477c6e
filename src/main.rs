use clap::{Parser, Subcommand};
use sop_assistant::Result;
use sop_assistant::commands::{run_chat, run_ingest, show_status};
use sop_assistant::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "sop-assistant")]
#[command(about = "A retrieval-augmented chat assistant for SOP document collections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure vector store, embedding provider, and models
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed the document folder into the vector store collection
    Ingest,
    /// Start an interactive chat session grounded in the collection
    Chat,
    /// Show credential, provider, and knowledge-base health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest => {
            run_ingest().await?;
        }
        Commands::Chat => {
            run_chat().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
