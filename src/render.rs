//! Renders pipeline output into the requested [`OutputFormat`].

use crate::format::OutputFormat;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Materialized pipeline result, ready for rendering.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub markdown: String,
    pub content_list: serde_json::Value,
}

pub type Renderer = fn(&Document) -> Result<String>;

const RENDERERS: [(OutputFormat, Renderer); 3] = [
    (OutputFormat::Markdown, render_markdown),
    (OutputFormat::Html, render_html),
    (OutputFormat::Json, render_json),
];

pub fn renderer_for(format: OutputFormat) -> Renderer {
    RENDERERS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, r)| *r)
        .unwrap_or(render_markdown)
}

pub fn render(doc: &Document, format: OutputFormat) -> Result<String> {
    renderer_for(format)(doc).with_context(|| format!("rendering {format}"))
}

fn render_markdown(doc: &Document) -> Result<String> {
    Ok(doc.markdown.clone())
}

fn render_json(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(&doc.content_list)?)
}

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("heading regex"));
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!\[([^\]]*)\]\(([^)\s]+)\)$").expect("image regex"));

/// Block-level markdown to HTML: headings, standalone images, paragraphs.
/// Inline markup is kept as escaped text; tables in markdown stay preformatted.
fn render_html(doc: &Document) -> Result<String> {
    let mut body = String::new();
    for block in doc.markdown.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        body.push_str(&html_block(block));
        body.push('\n');
    }
    Ok(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        html_escape(&doc.title),
        body
    ))
}

fn html_block(block: &str) -> String {
    if !block.contains('\n') {
        if let Some(c) = HEADING.captures(block) {
            let level = c[1].len();
            return format!("<h{level}>{}</h{level}>", html_escape(&c[2]));
        }
        if let Some(c) = IMAGE.captures(block) {
            return format!(
                "<img src=\"{}\" alt=\"{}\">",
                html_escape(&c[2]),
                html_escape(&c[1])
            );
        }
    }
    if block.starts_with('|') {
        return format!("<pre>{}</pre>", html_escape(block));
    }
    format!("<p>{}</p>", html_escape(block).replace('\n', "<br>\n"))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
