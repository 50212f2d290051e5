//! The document extraction gateway: one service context shared by all requests.

use crate::{
    config::Config,
    engine::{AnalyzeIn, Engine, python::PythonEngine},
    extract::{
        Extraction, ExtractionTier, Extractor, PageTextExtractor, ParagraphTextExtractor,
        extract_with_fallback,
    },
    format::OutputFormat,
    language::{DetectedLanguage, LanguageIdentifier, WhatlangIdentifier, detect_language},
    postprocess::{join_segments, normalize_segments, normalize_text},
    render::{self, Document},
    upload::{ScopedOutputDir, ScopedUpload, UploadedDocument},
    util::short_digest,
    writer::{DataWriter, DiskWriter},
};
use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const IMAGE_DIR: &str = "images";

pub type EngineFactory = Arc<dyn Fn(&Config) -> Result<Box<dyn Engine>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TextOptions {
    pub return_content_list: bool,
    pub detect_language: bool,
}

impl TextOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            return_content_list: false,
            detect_language: cfg.extraction.detect_language,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub extract_images: bool,
    pub preserve_layout: bool,
    pub output_format: OutputFormat,
    pub detect_language: bool,
    pub support_tables: bool,
}

impl PipelineOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            extract_images: true,
            preserve_layout: true,
            output_format: OutputFormat::parse_lenient(&cfg.pipeline.output_format),
            detect_language: true,
            support_tables: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextOutcome {
    pub segments: Vec<String>,
    pub language: DetectedLanguage,
    pub tier: ExtractionTier,
}

/// Success body of the text flow.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TextBody {
    ContentList {
        content_list: Vec<String>,
        language: DetectedLanguage,
        pages: usize,
        status: &'static str,
    },
    Joined {
        result: String,
        language: DetectedLanguage,
        pages: usize,
        status: &'static str,
    },
}

impl TextOutcome {
    pub fn into_body(self, return_content_list: bool) -> TextBody {
        let pages = self.segments.len();
        if return_content_list {
            TextBody::ContentList {
                content_list: self.segments,
                language: self.language,
                pages,
                status: "success",
            }
        } else {
            TextBody::Joined {
                result: join_segments(&self.segments),
                language: self.language,
                pages,
                status: "success",
            }
        }
    }
}

pub struct Gateway {
    cfg: Config,
    primary: Arc<dyn Extractor>,
    secondary: Arc<dyn Extractor>,
    identifier: Arc<dyn LanguageIdentifier>,
    engine_factory: EngineFactory,
}

impl Gateway {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            primary: Arc::new(PageTextExtractor),
            secondary: Arc::new(ParagraphTextExtractor),
            identifier: Arc::new(WhatlangIdentifier),
            engine_factory: Arc::new(|cfg: &Config| -> Result<Box<dyn Engine>> {
                Ok(Box::new(PythonEngine::new(cfg)?))
            }),
        }
    }

    pub fn with_extractors(
        mut self,
        primary: Arc<dyn Extractor>,
        secondary: Arc<dyn Extractor>,
    ) -> Self {
        self.primary = primary;
        self.secondary = secondary;
        self
    }

    pub fn with_identifier(mut self, identifier: Arc<dyn LanguageIdentifier>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_engine_factory(mut self, factory: EngineFactory) -> Self {
        self.engine_factory = factory;
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn temp_parent(&self) -> Option<PathBuf> {
        let raw = self.cfg.extraction.temp_dir.trim();
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    }

    /// Text flow, run off the async executor.
    pub async fn parse_text(
        self: &Arc<Self>,
        doc: UploadedDocument,
        opts: TextOptions,
    ) -> Result<TextOutcome> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.parse_text_blocking(&doc, opts))
            .await
            .map_err(|e| anyhow!("extraction task failed: {e}"))?
    }

    /// Pipeline flow, run off the async executor.
    pub async fn parse_pipeline(
        self: &Arc<Self>,
        doc: UploadedDocument,
        opts: PipelineOptions,
    ) -> Result<String> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.parse_pipeline_blocking(&doc, opts))
            .await
            .map_err(|e| anyhow!("pipeline task failed: {e}"))?
    }

    pub fn parse_text_blocking(
        &self,
        doc: &UploadedDocument,
        opts: TextOptions,
    ) -> Result<TextOutcome> {
        let digest = short_digest(&doc.bytes);
        info!(
            "text parse {} ({} bytes, sha256 {digest})",
            doc.filename,
            doc.bytes.len()
        );

        let upload = ScopedUpload::persist(doc, self.temp_parent().as_deref())?;
        let Extraction { segments, tier } =
            extract_with_fallback(self.primary.as_ref(), self.secondary.as_ref(), upload.path());
        drop(upload);

        let segments = normalize_segments(&self.cfg, segments);
        let language = if opts.detect_language {
            detect_language(
                self.identifier.as_ref(),
                &segments,
                self.cfg.extraction.sample_segments,
            )
        } else {
            DetectedLanguage::unknown()
        };

        info!(
            "text parse {} done: tier={tier:?} segments={} language={language}",
            doc.filename,
            segments.len()
        );
        Ok(TextOutcome {
            segments,
            language,
            tier,
        })
    }

    pub fn parse_pipeline_blocking(
        &self,
        doc: &UploadedDocument,
        opts: PipelineOptions,
    ) -> Result<String> {
        let digest = short_digest(&doc.bytes);
        info!(
            "pipeline parse {} ({} bytes, sha256 {digest}) format={}",
            doc.filename,
            doc.bytes.len(),
            opts.output_format
        );

        let parent = self.temp_parent();
        let upload = ScopedUpload::persist(doc, parent.as_deref())?;
        let out_dir = ScopedOutputDir::create(parent.as_deref())?;

        let engine = (self.engine_factory)(&self.cfg).with_context(|| "building pipeline")?;
        let req = AnalyzeIn {
            input_pdf: upload.path().display().to_string(),
            image_dir: out_dir.path().join(IMAGE_DIR).display().to_string(),
            pipeline: self.cfg.pipeline.name.clone(),
            parse_method: self.cfg.pipeline.parse_method.clone(),
            extract_images: opts.extract_images,
            preserve_layout: opts.preserve_layout,
            support_tables: opts.support_tables,
            detect_language: opts.detect_language,
        };
        let out = engine.analyze(&req)?;

        let writer = DiskWriter::new(out_dir.path());
        if opts.extract_images {
            save_images(&writer, &out.images)?;
        }

        let stem = doc.safe_stem();
        let markdown = normalize_text(&self.cfg, out.markdown);
        if !writer.save(markdown.as_bytes(), &format!("{stem}.md")) {
            warn!("could not persist markdown for {}", doc.filename);
        }

        let rendered = render::render(
            &Document {
                title: stem,
                markdown,
                content_list: out.content_list,
            },
            opts.output_format,
        )?;
        info!(
            "pipeline parse {} done: {} images, {} chars",
            doc.filename,
            out.images.len(),
            rendered.len()
        );
        Ok(rendered)
    }
}

fn save_images(writer: &dyn DataWriter, images: &[crate::engine::ImageOut]) -> Result<()> {
    for img in images {
        let name = Path::new(&img.name)
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("invalid image name: {:?}", img.name))?;
        let bytes = BASE64
            .decode(img.data_base64.as_bytes())
            .with_context(|| format!("decoding image {name}"))?;
        if !writer.save(&bytes, &format!("{IMAGE_DIR}/{name}")) {
            warn!("image {name} was not saved");
        }
    }
    Ok(())
}
