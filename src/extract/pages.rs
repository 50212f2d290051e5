use super::Extractor;
use anyhow::{Context, Result, anyhow};
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

/// Page-oriented extraction through `lopdf`: one segment per page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageTextExtractor;

impl Extractor for PageTextExtractor {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, input: &Path) -> Result<Vec<String>> {
        let doc = Document::load(input)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("loading PDF: {}", input.display()))?;

        let pages = doc.get_pages();
        debug!("lopdf loaded {} pages from {}", pages.len(), input.display());

        let mut segments = Vec::with_capacity(pages.len());
        for page_num in pages.keys() {
            // Unreadable pages stay as empty segments to keep page order.
            match doc.extract_text(&[*page_num]) {
                Ok(text) => segments.push(text),
                Err(err) => {
                    warn!("lopdf page {page_num} text failed: {err}");
                    segments.push(String::new());
                }
            }
        }
        Ok(segments)
    }
}
