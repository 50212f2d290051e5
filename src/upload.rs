//! Per-request persistence of uploaded documents.
//!
//! Every upload lives in its own uniquely named temp directory. The directory
//! is removed when the owning [`ScopedUpload`] is dropped, so early returns,
//! `?` propagation and unwinding all release it.

use crate::util::ensure_dir;
use anyhow::{Context, Result};
use axum::body::Bytes;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// File stem safe to use as a single path component.
    pub fn safe_stem(&self) -> String {
        let name = Path::new(&self.filename)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let stem = name
            .strip_suffix(".pdf")
            .or_else(|| name.strip_suffix(".PDF"))
            .unwrap_or(name);
        let cleaned: String = stem
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let cleaned = cleaned.trim_matches('.').to_string();
        if cleaned.is_empty() {
            "upload".to_string()
        } else {
            cleaned
        }
    }
}

pub struct ScopedUpload {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScopedUpload {
    /// Writes `doc` under a fresh temp dir inside `parent` (system temp dir when `None`).
    pub fn persist(doc: &UploadedDocument, parent: Option<&Path>) -> Result<Self> {
        let dir = scoped_dir("pdf-gateway-upload-", parent)?;
        let path = dir.path().join(format!("{}.pdf", doc.safe_stem()));
        std::fs::write(&path, &doc.bytes)
            .with_context(|| format!("writing upload to {}", path.display()))?;
        debug!("persisted {} bytes to {}", doc.bytes.len(), path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedUpload {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            release(dir);
        }
    }
}

/// Scoped output directory for pipeline artifacts.
pub struct ScopedOutputDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScopedOutputDir {
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let dir = scoped_dir("pdf-gateway-output-", parent)?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedOutputDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            release(dir);
        }
    }
}

fn scoped_dir(prefix: &str, parent: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match parent {
        Some(p) => {
            ensure_dir(p)?;
            builder
                .tempdir_in(p)
                .with_context(|| format!("creating temp dir in {}", p.display()))
        }
        None => builder.tempdir().with_context(|| "creating temp dir"),
    }
}

fn release(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => debug!("removed {}", path.display()),
        Err(err) => warn!("failed to remove {}: {err}", path.display()),
    }
}
