use crate::config::Config;
use unicode_normalization::UnicodeNormalization;

/// Normalizes each segment in place. Segment count and order are preserved.
pub fn normalize_segments(cfg: &Config, segments: Vec<String>) -> Vec<String> {
    segments
        .into_iter()
        .map(|s| normalize_text(cfg, s))
        .collect()
}

pub fn normalize_text(cfg: &Config, mut s: String) -> String {
    if cfg.postprocess.normalize_newlines {
        s = s.replace("\r\n", "\n").replace('\r', "\n");
    }
    if cfg.postprocess.normalize_unicode {
        s = s.nfkc().collect::<String>();
    }
    s
}

/// Separator between segments in the joined text response.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

pub fn join_segments(segments: &[String]) -> String {
    segments.join(SEGMENT_SEPARATOR)
}
