use anyhow::{Result, anyhow};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pdf_gateway::{
    config::{Config, Variant},
    engine::{AnalyzeIn, AnalyzeOut, DocDiag, Engine},
    extract::Extractor,
    gateway::{EngineFactory, Gateway},
    language::LanguageIdentifier,
    server,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const BOUNDARY: &str = "pdfgatewaytestboundary";

/// Extractor fake that counts calls and remembers the last input path.
struct Fake {
    out: Vec<String>,
    fail: bool,
    panic: bool,
    calls: AtomicUsize,
    seen: Mutex<Option<PathBuf>>,
}

impl Fake {
    fn returning(segments: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            out: segments.iter().map(|s| s.to_string()).collect(),
            fail: false,
            panic: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            out: vec![],
            fail: true,
            panic: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        })
    }

    fn panicking() -> Arc<Self> {
        Arc::new(Self {
            out: vec![],
            fail: false,
            panic: true,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> PathBuf {
        self.seen.lock().unwrap().clone().expect("extractor was called")
    }
}

impl Extractor for Fake {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn extract(&self, input: &Path) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "upload must exist while extracting");
        *self.seen.lock().unwrap() = Some(input.to_path_buf());
        if self.panic {
            panic!("extractor crashed");
        }
        if self.fail {
            return Err(anyhow!("cannot parse"));
        }
        Ok(self.out.clone())
    }
}

struct English;
impl LanguageIdentifier for English {
    fn identify(&self, _sample: &str) -> Result<Vec<String>> {
        Ok(vec!["en:0.9999".into(), "de:0.0001".into()])
    }
}

struct Broken;
impl LanguageIdentifier for Broken {
    fn identify(&self, _sample: &str) -> Result<Vec<String>> {
        Err(anyhow!("profile missing"))
    }
}

fn app(primary: Arc<Fake>, secondary: Arc<Fake>) -> axum::Router {
    app_with(Config::default(), primary, secondary, Arc::new(English))
}

fn app_with(
    cfg: Config,
    primary: Arc<Fake>,
    secondary: Arc<Fake>,
    identifier: Arc<dyn LanguageIdentifier>,
) -> axum::Router {
    let gateway = Gateway::new(cfg)
        .with_extractors(primary, secondary)
        .with_identifier(identifier);
    server::router(Arc::new(gateway))
}

fn multipart(uri: &str, file: Option<&[u8]>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"doc.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

const PDF: &[u8] = b"%PDF-1.4 test fixture";

#[tokio::test]
async fn ping_is_ok() {
    let app = app(Fake::failing(), Fake::failing());
    let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn primary_text_never_touches_secondary() {
    let primary = Fake::returning(&["First page", "Second page"]);
    let secondary = Fake::returning(&["should not appear"]);
    let app = app(primary.clone(), secondary.clone());

    let (status, body) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "First page\n\nSecond page");
    assert_eq!(body["pages"], 2);
    assert_eq!(body["language"], "en");
    assert_eq!(body["status"], "success");
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn blank_primary_uses_secondary_once() {
    let primary = Fake::returning(&["  ", "\n\n"]);
    let secondary = Fake::returning(&["Paragraph one", "Paragraph two", "Paragraph three"]);
    let app = app(primary.clone(), secondary.clone());

    let (status, body) = send(
        app,
        multipart("/file_parse", Some(PDF), &[("return_content_list", "true")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["content_list"],
        serde_json::json!(["Paragraph one", "Paragraph two", "Paragraph three"])
    );
    assert_eq!(body["pages"], 3);
    assert!(body.get("result").is_none());
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn joined_result_equals_content_list_joined() {
    let primary = Fake::returning(&["alpha", "beta", "gamma"]);
    let secondary = Fake::returning(&[]);
    let app = app(primary, secondary);

    let (_, listed) = send(
        app.clone(),
        multipart("/file_parse", Some(PDF), &[("return_content_list", "true")]),
    )
    .await;
    let (_, joined) = send(
        app,
        multipart("/file_parse", Some(PDF), &[("return_content_list", "false")]),
    )
    .await;

    let parts: Vec<String> = serde_json::from_value(listed["content_list"].clone()).unwrap();
    assert_eq!(joined["result"], parts.join("\n\n"));
}

#[tokio::test]
async fn repeated_requests_are_consistent() {
    let app = app(Fake::returning(&["one", "two"]), Fake::returning(&[]));
    let (s1, b1) = send(app.clone(), multipart("/file_parse", Some(PDF), &[])).await;
    let (s2, b2) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(s1, s2);
    assert_eq!(b1["status"], b2["status"]);
    assert_eq!(b1["pages"], b2["pages"]);
}

#[tokio::test]
async fn failing_extractors_still_clean_up() {
    let primary = Fake::failing();
    let secondary = Fake::failing();
    let app = app(primary.clone(), secondary.clone());

    let (status, body) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "");
    assert_eq!(body["pages"], 0);
    assert_eq!(body["language"], "unknown");
    assert!(!primary.seen().exists());
    assert!(!secondary.seen().exists());
}

#[tokio::test]
async fn crashing_primary_falls_back_to_secondary() {
    let primary = Fake::panicking();
    let secondary = Fake::returning(&["recovered text"]);
    let app = app(primary.clone(), secondary.clone());

    let (status, body) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "recovered text");
    assert_eq!(secondary.calls(), 1);
    assert!(!primary.seen().exists());
}

struct Crashing;
impl LanguageIdentifier for Crashing {
    fn identify(&self, _sample: &str) -> Result<Vec<String>> {
        panic!("identifier crashed at /opt/models/lid.bin")
    }
}

#[tokio::test]
async fn crashing_task_is_a_generic_500_and_cleans_up() {
    let primary = Fake::returning(&["Some text"]);
    let app = app_with(
        Config::default(),
        primary.clone(),
        Fake::returning(&[]),
        Arc::new(Crashing),
    );

    let (status, body) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "error processing file");
    assert!(!primary.seen().exists());
}

#[tokio::test]
async fn extracted_text_is_returned_verbatim() {
    let raw = "\u{FF46}\u{FF55}\u{FF4C}\u{FF4C} \u{FB01}le \u{2460}";
    let app = app(Fake::returning(&[raw]), Fake::returning(&[]));
    let (status, body) = send(
        app,
        multipart("/file_parse", Some(PDF), &[("return_content_list", "true")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_list"][0], raw);
}

#[tokio::test]
async fn non_multipart_body_gets_json_error() {
    let app = app(Fake::returning(&["x"]), Fake::returning(&[]));
    let req = Request::builder()
        .method("POST")
        .uri("/file_parse")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"file": "doc.pdf"}"#))
        .unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("multipart"));
}

#[tokio::test]
async fn blank_text_reports_unknown_language() {
    let app = app_with(
        Config::default(),
        Fake::returning(&[" "]),
        Fake::returning(&[]),
        Arc::new(Broken),
    );
    let (status, body) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "unknown");
}

#[tokio::test]
async fn identifier_failure_never_fails_the_request() {
    let app = app_with(
        Config::default(),
        Fake::returning(&["Real text here"]),
        Fake::returning(&[]),
        Arc::new(Broken),
    );
    let (status, body) = send(app, multipart("/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "unknown");
    assert_eq!(body["result"], "Real text here");
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let app = app(Fake::returning(&["x"]), Fake::returning(&[]));
    let (status, body) = send(app, multipart("/file_parse", None, &[])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn invalid_flag_is_rejected() {
    let app = app(Fake::returning(&["x"]), Fake::returning(&[]));
    let (status, _) = send(
        app,
        multipart("/file_parse", Some(PDF), &[("return_content_list", "perhaps")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

struct StubEngine {
    seen: Mutex<Option<AnalyzeIn>>,
}

impl Engine for StubEngine {
    fn doctor(&self) -> Result<DocDiag> {
        Err(anyhow!("not used"))
    }

    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut> {
        *self.seen.lock().unwrap() = Some(req.clone());
        Ok(AnalyzeOut {
            ok: true,
            markdown: "# Findings\n\nBody text.".into(),
            content_list: serde_json::json!([{"type": "title", "text": "Findings"}]),
            images: vec![],
            warnings: vec![],
            meta: Value::Null,
            error: None,
        })
    }
}

fn pipeline_app(stub: Arc<StubEngine>) -> axum::Router {
    let mut cfg = Config::default();
    cfg.server.variant = Variant::Pipeline;
    let factory: EngineFactory = Arc::new(move |_cfg: &Config| -> Result<Box<dyn Engine>> {
        Ok(Box::new(SharedStub(Arc::clone(&stub))))
    });
    let gateway = Gateway::new(cfg).with_engine_factory(factory);
    server::router(Arc::new(gateway))
}

struct SharedStub(Arc<StubEngine>);
impl Engine for SharedStub {
    fn doctor(&self) -> Result<DocDiag> {
        self.0.doctor()
    }
    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut> {
        self.0.analyze(req)
    }
}

#[tokio::test]
async fn pipeline_unknown_format_falls_back_to_markdown() {
    let stub = Arc::new(StubEngine {
        seen: Mutex::new(None),
    });
    let app = pipeline_app(stub.clone());
    let (status, body) = send(
        app,
        multipart("/file_parse", Some(PDF), &[("output_format", "xml")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "# Findings\n\nBody text.");
    assert_eq!(body["status"], "success");

    let seen = stub.seen.lock().unwrap().clone().unwrap();
    assert!(!Path::new(&seen.input_pdf).exists());
}

#[tokio::test]
async fn pipeline_json_and_html() {
    let stub = Arc::new(StubEngine {
        seen: Mutex::new(None),
    });
    let app = pipeline_app(stub);

    let (_, json) = send(
        app.clone(),
        multipart("/file_parse", Some(PDF), &[("output_format", "json")]),
    )
    .await;
    let list: Value = serde_json::from_str(json["result"].as_str().unwrap()).unwrap();
    assert_eq!(list[0]["type"], "title");

    let (_, html) = send(
        app,
        multipart("/file_parse", Some(PDF), &[("output_format", "html")]),
    )
    .await;
    let html = html["result"].as_str().unwrap();
    assert!(html.contains("<h1>Findings</h1>"));
    assert!(html.contains("<p>Body text.</p>"));
}

#[tokio::test]
async fn pipeline_construction_failure_is_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.security.pin_scripts_dir = false;
    cfg.pipeline.scripts_dir = dir.path().display().to_string();
    cfg.pipeline.name = "unsupported".into();
    cfg.extraction.temp_dir = dir.path().join("tmp").display().to_string();
    let app = server::router(Arc::new(Gateway::new(cfg)));

    let (status, body) = send(app, multipart("/pipeline/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "error processing file");

    let leftovers = std::fs::read_dir(dir.path().join("tmp")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn explicit_text_route_ignores_variant() {
    let mut cfg = Config::default();
    cfg.server.variant = Variant::Pipeline;
    let app = app_with(
        cfg,
        Fake::returning(&["text route"]),
        Fake::returning(&[]),
        Arc::new(English),
    );
    let (status, body) = send(app, multipart("/text/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "text route");
}

#[tokio::test]
async fn runner_traceback_stays_out_of_the_response() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("runner.sh"),
        "cat > /dev/null\n\
         echo 'Traceback (most recent call last):' >&2\n\
         echo '  File \"/opt/secret/runner.py\", line 42' >&2\n\
         exit 1\n",
    )
    .unwrap();
    let mut cfg = Config::default();
    cfg.security.pin_scripts_dir = false;
    cfg.pipeline.python_exe = "sh".into();
    cfg.pipeline.scripts_dir = dir.path().display().to_string();
    cfg.pipeline.runner_script = "runner.sh".into();
    let app = server::router(Arc::new(Gateway::new(cfg)));

    let (status, body) = send(app, multipart("/pipeline/file_parse", Some(PDF), &[])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    let message = body["message"].as_str().unwrap();
    assert_eq!(message, "error processing file");
    assert!(!message.contains("Traceback"));
    assert!(!message.contains("runner"));
}
