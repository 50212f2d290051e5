use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub postprocess: Postprocess,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

/// Which request flow answers `POST /file_parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Text,
    Pipeline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub variant: Variant,
    pub max_upload_bytes: usize,
    pub cors_allow_any: bool,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8888,
            variant: Variant::Text,
            max_upload_bytes: 200 * 1024 * 1024,
            cors_allow_any: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Extraction {
    pub detect_language: bool,
    pub sample_segments: usize,
    /// Parent for per-request temp dirs. Empty means the system temp dir.
    pub temp_dir: String,
}
impl Default for Extraction {
    fn default() -> Self {
        Self {
            detect_language: true,
            sample_segments: 3,
            temp_dir: "".into(),
        }
    }
}

/// Optional rewriting of extracted text. Off unless configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Postprocess {
    pub normalize_unicode: bool,
    pub normalize_newlines: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub python_exe: String,
    pub scripts_dir: String,
    pub runner_script: String,
    /// Pipeline name handed to the runner; only names in `supported` are accepted.
    pub name: String,
    pub supported: Vec<String>,
    pub parse_method: String,
    pub models_dir: String,
    pub timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    pub output_format: String,
    pub env: std::collections::BTreeMap<String, String>,
}
impl Default for Pipeline {
    fn default() -> Self {
        Self {
            python_exe: "python3".into(),
            scripts_dir: "scripts".into(),
            runner_script: "pipeline_runner.py".into(),
            name: "doc_analyze".into(),
            supported: vec!["doc_analyze".into()],
            parse_method: "auto".into(),
            models_dir: "".into(),
            timeout_seconds: 600,
            doctor_timeout_seconds: 60,
            output_format: "markdown".into(),
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "logs/pdf-gateway.log".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_python_stderr: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            pin_scripts_dir: true,
        }
    }
}
