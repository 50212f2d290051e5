use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDiag {
    pub python_exe: String,
    pub python_version: String,
    pub pipeline_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeIn {
    pub input_pdf: String,
    pub image_dir: String,
    pub pipeline: String,
    pub parse_method: String,
    pub extract_images: bool,
    pub preserve_layout: bool,
    pub support_tables: bool,
    pub detect_language: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOut {
    pub ok: bool,
    #[serde(default)]
    pub markdown: String,
    /// Native structured output of the pipeline, passed through untouched.
    #[serde(default)]
    pub content_list: serde_json::Value,
    #[serde(default)]
    pub images: Vec<ImageOut>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub meta: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOut {
    pub name: String,
    pub data_base64: String,
}
