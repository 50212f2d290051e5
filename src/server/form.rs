//! Multipart form decoding for `/file_parse`.

use super::error::{ApiError, ApiResult};
use crate::{
    config::Config,
    format::OutputFormat,
    gateway::{PipelineOptions, TextOptions},
    upload::UploadedDocument,
};
use axum::extract::Multipart;
use std::collections::HashMap;
use tracing::debug;

/// Raw fields of one `/file_parse` submission.
#[derive(Debug, Default)]
pub struct ParseForm {
    pub file: Option<UploadedDocument>,
    pub fields: HashMap<String, String>,
}

impl ParseForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = ParseForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file data: {e}")))?;
                debug!("received file '{}' ({} bytes)", filename, bytes.len());
                form.file = Some(UploadedDocument::new(filename, bytes));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read field {name}: {e}")))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn take_file(&mut self) -> ApiResult<UploadedDocument> {
        self.file
            .take()
            .ok_or_else(|| ApiError::BadRequest("missing required form field 'file'".into()))
    }

    fn flag(&self, name: &str, default: bool) -> ApiResult<bool> {
        match self.fields.get(name) {
            None => Ok(default),
            Some(raw) => parse_bool(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("field '{name}' is not a boolean: {raw:?}"))),
        }
    }

    fn log_unknown(&self, known: &[&str]) {
        for name in self.fields.keys() {
            if !known.contains(&name.as_str()) {
                debug!("ignoring unknown form field '{name}'");
            }
        }
    }

    pub fn text_options(&self, cfg: &Config) -> ApiResult<TextOptions> {
        self.log_unknown(&["return_content_list", "detect_language"]);
        let defaults = TextOptions::from_config(cfg);
        Ok(TextOptions {
            return_content_list: self.flag("return_content_list", defaults.return_content_list)?,
            detect_language: self.flag("detect_language", defaults.detect_language)?,
        })
    }

    pub fn pipeline_options(&self, cfg: &Config) -> ApiResult<PipelineOptions> {
        self.log_unknown(&[
            "extract_images",
            "preserve_layout",
            "output_format",
            "detect_language",
            "support_tables",
        ]);
        let defaults = PipelineOptions::from_config(cfg);
        let output_format = self
            .fields
            .get("output_format")
            .map(|raw| OutputFormat::parse_lenient(raw))
            .unwrap_or(defaults.output_format);
        Ok(PipelineOptions {
            extract_images: self.flag("extract_images", defaults.extract_images)?,
            preserve_layout: self.flag("preserve_layout", defaults.preserve_layout)?,
            output_format,
            detect_language: self.flag("detect_language", defaults.detect_language)?,
            support_tables: self.flag("support_tables", defaults.support_tables)?,
        })
    }
}

/// Form boolean in the spellings HTML forms and scripts commonly send.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "off" | "n" | "f" => Some(false),
        _ => None,
    }
}
