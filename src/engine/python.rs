use super::{Engine, types::*};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs the analysis pipeline in a child interpreter, JSON over stdin/stdout.
pub struct PythonEngine {
    cfg: Config,
    runner: PathBuf,
    python_exe: PathBuf,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let pipeline = &cfg.pipeline;
        if !pipeline.supported.iter().any(|name| name == &pipeline.name) {
            return Err(anyhow!(
                "unsupported pipeline: {} (supported: {})",
                pipeline.name,
                pipeline.supported.join(", ")
            ));
        }

        let scripts_dir = PathBuf::from(&pipeline.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }

        let runner = scripts_dir.join(&pipeline.runner_script);
        if !runner.exists() {
            return Err(anyhow!("missing pipeline runner: {}", runner.display()));
        }
        let python_exe = resolve_python_exe(&pipeline.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            runner,
            python_exe,
        })
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        input: &I,
        timeout_seconds: Option<u64>,
    ) -> Result<O> {
        let script = &self.runner;
        debug!(
            "python run {} timeout={:?}",
            script.display(),
            timeout_seconds
        );
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(script);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.pipeline.env {
            cmd.env(k, v);
        }
        if !self.cfg.pipeline.models_dir.is_empty() {
            cmd.env("PIPELINE_MODELS_DIR", &self.cfg.pipeline.models_dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", script.display()))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = serde_json::to_vec(input)?;
            stdin.write_all(&bytes)?;
            stdin.flush().ok();
        }

        let output = if let Some(secs) = timeout_seconds {
            wait_with_timeout(&mut child, Duration::from_secs(secs))?
        } else {
            child
                .wait_with_output()
                .with_context(|| "waiting for python")?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "pipeline runner failed: {}\n{}",
                script.display(),
                stderr
            ));
        }

        if self.cfg.debug.keep_python_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("python stderr {}: {}", script.display(), stderr.trim());
        }

        let out: O = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing runner JSON output: {}", script.display()))?;
        Ok(out)
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("PIPELINE_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn timeout_of(secs: u64) -> Option<u64> {
    if secs > 0 { Some(secs) } else { None }
}

impl Engine for PythonEngine {
    fn doctor(&self) -> Result<DocDiag> {
        self.run_json::<serde_json::Value, DocDiag>(
            &serde_json::json!({"cmd": "doctor"}),
            timeout_of(self.cfg.pipeline.doctor_timeout_seconds),
        )
    }

    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut> {
        let out: AnalyzeOut = self.run_json(
            &serde_json::json!({"cmd": "analyze", "req": req}),
            timeout_of(self.cfg.pipeline.timeout_seconds),
        )?;
        if !out.ok {
            let msg = out
                .error
                .clone()
                .unwrap_or_else(|| "pipeline returned ok=false".to_string());
            return Err(anyhow!("pipeline {} failed: {msg}", req.pipeline));
        }
        for w in &out.warnings {
            warn!("pipeline warning: {w}");
        }
        Ok(out)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty runner can't deadlock on a full pipe buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let join = |h: std::thread::JoinHandle<Result<Vec<u8>>>, what: &str| -> Result<Vec<u8>> {
        h.join()
            .map_err(|_| anyhow!("{what} reader thread panicked"))?
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            return Ok(Output {
                status,
                stdout: join(stdout_thread, "stdout")?,
                stderr: join(stderr_thread, "stderr")?,
            });
        }

        if start.elapsed() > timeout {
            warn!("pipeline runner timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let _ = join(stdout_thread, "stdout");
            let stderr = join(stderr_thread, "stderr").unwrap_or_default();
            return Err(anyhow!(
                "pipeline runner exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Builds an engine config pointing at `runner` inside `dir`, for tests.
#[cfg(test)]
pub(crate) fn test_config(dir: &std::path::Path, runner_body: &str) -> Config {
    let runner = dir.join("runner.sh");
    std::fs::write(&runner, runner_body).unwrap();
    let mut cfg = Config::default();
    cfg.security.pin_scripts_dir = false;
    cfg.pipeline.python_exe = "sh".into();
    cfg.pipeline.scripts_dir = dir.display().to_string();
    cfg.pipeline.runner_script = "runner.sh".into();
    cfg
}
