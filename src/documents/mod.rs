// Document loading module
// Reads the local document folder into embeddable text, one run at a time

#[cfg(test)]
mod tests;

pub mod pdf;

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{Result, SopError};

/// Extensions the directory loader accepts.
const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// A source file loaded into text form. Not retained after embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: PathBuf,
    /// File stem, used as the document title in chunk metadata.
    pub title: String,
    pub pages: Vec<PageText>,
}

/// Extracted text of one page. Plain-text documents load as a single
/// synthetic page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: usize,
    pub text: String,
}

impl Document {
    #[inline]
    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.text.len()).sum()
    }
}

/// Load every supported document under `dir`, in path order.
///
/// A missing directory, an empty directory, and any unreadable or
/// text-free file all abort the whole run. There is no per-document
/// isolation: ingestion is all-or-nothing.
#[inline]
pub fn load_directory(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(SopError::DataLoad(format!(
            "Document directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(SopError::DataLoad(format!(
            "No readable documents found in {} (supported: {})",
            dir.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    info!("Loading {} documents from {}", paths.len(), dir.display());

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let document = load_document(&path)?;
        debug!(
            "Loaded {} ({} pages, {} chars)",
            document.title,
            document.pages.len(),
            document.total_chars()
        );
        documents.push(document);
    }

    Ok(documents)
}

/// Load a single document into pages.
#[inline]
pub fn load_document(path: &Path) -> Result<Document> {
    let title = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("untitled")
        .to_string();

    let pages = if has_extension(path, "pdf") {
        pdf::extract_pages(path)?
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SopError::DataLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if text.trim().is_empty() {
            return Err(SopError::DataLoad(format!(
                "No extractable text in {}",
                path.display()
            )));
        }
        vec![PageText {
            page_number: 1,
            text,
        }]
    };

    Ok(Document {
        path: path.to_path_buf(),
        title,
        pages,
    })
}

fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|ext| has_extension(path, ext))
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}
