pub mod python;
pub mod types;

use anyhow::Result;

pub use types::{AnalyzeIn, AnalyzeOut, DocDiag, ImageOut};

/// External document-analysis pipeline.
pub trait Engine: Send + Sync {
    fn doctor(&self) -> Result<DocDiag>;
    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut>;
}
