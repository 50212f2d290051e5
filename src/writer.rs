use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Sink for pipeline artifacts (rendered markdown, extracted images).
pub trait DataWriter {
    /// Stores `content` at `rel_path`; returns whether the write happened.
    fn save(&self, content: &[u8], rel_path: &str) -> bool;
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Writes below a fixed root directory.
pub struct DiskWriter {
    root: PathBuf,
}

impl DiskWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, rel_path: &str) -> Option<PathBuf> {
        let rel = Path::new(rel_path);
        if rel_path.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(rel))
    }
}

impl DataWriter for DiskWriter {
    fn save(&self, content: &[u8], rel_path: &str) -> bool {
        let Some(path) = self.resolve(rel_path) else {
            warn!("refusing to write outside output root: {rel_path:?}");
            return false;
        };
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("create_dir_all {}: {err}", parent.display());
                return false;
            }
        }
        match std::fs::write(&path, content) {
            Ok(()) => true,
            Err(err) => {
                warn!("write {}: {err}", path.display());
                false
            }
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        bail!("DiskWriter is write-only; cannot read {path}")
    }
}
