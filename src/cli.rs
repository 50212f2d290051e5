use crate::{
    config::{Config, Variant},
    engine::{Engine, python::PythonEngine},
    gateway::{Gateway, TextOptions},
    server,
    upload::UploadedDocument,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdf-gateway")]
#[command(about = "HTTP gateway that extracts text or structured markdown from uploaded PDFs")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdf-gateway.toml if present, else defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listen address, e.g. 127.0.0.1:8888. Defaults to server.host:server.port.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Check that the pipeline runner can be started.
    Doctor {},
    /// Run the text flow once against a local PDF and print the response body.
    Extract {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        content_list: bool,
        #[arg(long)]
        no_language: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Serve { bind } => serve(cfg, bind.as_deref()),
        Command::Doctor {} => doctor(&cfg),
        Command::Extract {
            input,
            content_list,
            no_language,
        } => extract(cfg, input, *content_list, !*no_language),
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    let default = PathBuf::from("pdf-gateway.toml");
    if default.exists() {
        Config::load(&default)
    } else {
        Ok(Config::default())
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let file_path = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        Some(PathBuf::from(&cfg.logging.file_path))
    } else {
        None
    };

    let (file_layer, guard) = if let Some(path) = file_path.as_deref() {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn serve(cfg: Config, bind: Option<&str>) -> Result<()> {
    let addr = server::bind_addr(&cfg, bind)?;
    info!(
        "starting pdf-gateway v{} variant={:?}",
        env!("CARGO_PKG_VERSION"),
        cfg.server.variant
    );
    if let Err(err) = PythonEngine::new(&cfg) {
        if cfg.server.variant == Variant::Pipeline {
            warn!("pipeline runner unavailable; pipeline requests will fail: {err:#}");
        } else {
            debug!("pipeline runner unavailable: {err:#}");
        }
    }

    let gateway = Arc::new(Gateway::new(cfg));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "building tokio runtime")?;
    runtime.block_on(server::serve(gateway, addr))
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PythonEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "checked_at": now_rfc3339(),
            "pipeline": cfg.pipeline.name,
            "diag": diag,
        }))?
    );
    Ok(())
}

fn extract(cfg: Config, input: &Path, content_list: bool, detect_language: bool) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("reading input: {}", input.display()))?;
    let filename = input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("input.pdf")
        .to_string();

    let gateway = Gateway::new(cfg);
    let opts = TextOptions {
        return_content_list: content_list,
        detect_language,
    };
    let outcome = gateway.parse_text_blocking(&UploadedDocument::new(filename, bytes), opts)?;
    let body = outcome.into_body(content_list);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
