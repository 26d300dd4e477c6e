//! PDF text extraction, page by page.

use std::path::Path;

use pdf_oxide::PdfDocument;
use pdf_oxide::converters::ConversionOptions;
use tracing::debug;

use super::PageText;
use crate::{Result, SopError};

fn conversion_options() -> ConversionOptions {
    ConversionOptions {
        include_images: false,
        ..ConversionOptions::default()
    }
}

/// Extract the text of every page of a PDF file.
///
/// Pages with no text are skipped; a document where every page is empty is
/// an error, since an unreadable document aborts the whole ingestion run.
#[inline]
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>> {
    let path_str = path.to_string_lossy();
    let mut doc = PdfDocument::open(path_str.as_ref()).map_err(|e| {
        SopError::DataLoad(format!("Failed to open PDF {}: {}", path.display(), e))
    })?;

    let page_count = doc.page_count().map_err(|e| {
        SopError::DataLoad(format!(
            "Failed to read page count of {}: {}",
            path.display(),
            e
        ))
    })?;

    let options = conversion_options();
    let mut pages = Vec::new();

    for page_index in 0..page_count {
        let text = doc.to_markdown(page_index, &options).map_err(|e| {
            SopError::DataLoad(format!(
                "Failed to extract page {} of {}: {}",
                page_index + 1,
                path.display(),
                e
            ))
        })?;

        if !text.trim().is_empty() {
            pages.push(PageText {
                page_number: page_index + 1,
                text,
            });
        }
    }

    if pages.is_empty() {
        return Err(SopError::DataLoad(format!(
            "No extractable text in {}",
            path.display()
        )));
    }

    debug!(
        "Extracted {} pages of text from {}",
        pages.len(),
        path.display()
    );

    Ok(pages)
}
