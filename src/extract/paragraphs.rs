use super::Extractor;
use crate::util::is_blank;
use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Whole-document extraction through `pdf-extract`, split into paragraphs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParagraphTextExtractor;

impl Extractor for ParagraphTextExtractor {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, input: &Path) -> Result<Vec<String>> {
        let mut file =
            File::open(input).with_context(|| format!("opening {}", input.display()))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .with_context(|| format!("reading {}", input.display()))?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| anyhow!("pdf-extract failed: {e}"))?;
        Ok(split_paragraphs(&text))
    }
}

/// Splits on blank-line boundaries and drops whitespace-only paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .filter(|p| !is_blank(p))
        .map(str::to_string)
        .collect()
}
