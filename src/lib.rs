use thiserror::Error;

pub type Result<T> = std::result::Result<T, SopError>;

#[derive(Error, Debug)]
pub enum SopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod gemini;
pub mod ingest;
pub mod store;
