pub mod paragraphs;
pub mod pages;

use crate::util::is_blank;
use anyhow::Result;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, info, warn};

pub use pages::PageTextExtractor;
pub use paragraphs::ParagraphTextExtractor;

/// A text extraction backend. Segments are returned in document order.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, input: &Path) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    Primary,
    Secondary,
    /// Neither backend produced usable text.
    None,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub segments: Vec<String>,
    pub tier: ExtractionTier,
}

pub fn has_text(segments: &[String]) -> bool {
    segments.iter().any(|s| !is_blank(s))
}

/// Runs `primary`, and `secondary` only when the primary output has no usable text.
///
/// Backend errors and panics are logged and treated as empty output. The
/// secondary result replaces the primary one wholesale; its segments need not
/// align with pages.
pub fn extract_with_fallback(
    primary: &dyn Extractor,
    secondary: &dyn Extractor,
    input: &Path,
) -> Extraction {
    let segments = run_backend(primary, input);
    if has_text(&segments) {
        return Extraction {
            segments,
            tier: ExtractionTier::Primary,
        };
    }

    info!(
        "{} produced no text for {}; trying {}",
        primary.name(),
        input.display(),
        secondary.name()
    );
    let segments = run_backend(secondary, input);
    let tier = if !has_text(&segments) {
        warn!("{} produced no text either", secondary.name());
        ExtractionTier::None
    } else {
        ExtractionTier::Secondary
    };
    Extraction { segments, tier }
}

fn run_backend(backend: &dyn Extractor, input: &Path) -> Vec<String> {
    // PDF parsers panic on some malformed inputs.
    match panic::catch_unwind(AssertUnwindSafe(|| backend.extract(input))) {
        Ok(Ok(segments)) => segments,
        Ok(Err(err)) => {
            error!("{} extraction failed: {:#}", backend.name(), err);
            Vec::new()
        }
        Err(payload) => {
            error!("{} panicked: {}", backend.name(), panic_message(payload.as_ref()));
            Vec::new()
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
