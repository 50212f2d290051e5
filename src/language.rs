//! Best-effort language identification over a sample of extracted segments.

use crate::util::is_blank;
use anyhow::{Result, anyhow};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, warn};
use whatlang::Lang;

/// Ranks candidate languages for a text sample.
///
/// Candidates are ordered best first and formatted as `label:confidence`.
pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, sample: &str) -> Result<Vec<String>>;
}

/// Identifier backed by `whatlang`.
///
/// Labels are ISO 639-1 codes (`en`, `fr`, `zh-cn`); languages without a
/// two-letter code keep whatlang's ISO 639-3 code.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangIdentifier;

impl LanguageIdentifier for WhatlangIdentifier {
    fn identify(&self, sample: &str) -> Result<Vec<String>> {
        let info = whatlang::detect(sample).ok_or_else(|| anyhow!("no language detected"))?;
        Ok(vec![format!(
            "{}:{:.4}",
            short_code(info.lang()),
            info.confidence()
        )])
    }
}

fn short_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Afr => "af",
        Lang::Aka => "ak",
        Lang::Amh => "am",
        Lang::Ara => "ar",
        Lang::Aze => "az",
        Lang::Bel => "be",
        Lang::Ben => "bn",
        Lang::Bul => "bg",
        Lang::Cat => "ca",
        Lang::Ces => "cs",
        Lang::Cmn => "zh-cn",
        Lang::Dan => "da",
        Lang::Deu => "de",
        Lang::Ell => "el",
        Lang::Eng => "en",
        Lang::Epo => "eo",
        Lang::Est => "et",
        Lang::Fin => "fi",
        Lang::Fra => "fr",
        Lang::Guj => "gu",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Hrv => "hr",
        Lang::Hun => "hu",
        Lang::Ind => "id",
        Lang::Ita => "it",
        Lang::Jav => "jv",
        Lang::Jpn => "ja",
        Lang::Kan => "kn",
        Lang::Kat => "ka",
        Lang::Khm => "km",
        Lang::Kor => "ko",
        Lang::Lat => "la",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Mal => "ml",
        Lang::Mar => "mr",
        Lang::Mkd => "mk",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Nld => "nl",
        Lang::Nob => "no",
        Lang::Ori => "or",
        Lang::Pan => "pa",
        Lang::Pes => "fa",
        Lang::Pol => "pl",
        Lang::Por => "pt",
        Lang::Ron => "ro",
        Lang::Rus => "ru",
        Lang::Sin => "si",
        Lang::Slk => "sk",
        Lang::Slv => "sl",
        Lang::Sna => "sn",
        Lang::Spa => "es",
        Lang::Srp => "sr",
        Lang::Swe => "sv",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Tgl => "tl",
        Lang::Tha => "th",
        Lang::Tuk => "tk",
        Lang::Tur => "tr",
        Lang::Ukr => "uk",
        Lang::Urd => "ur",
        Lang::Uzb => "uz",
        Lang::Vie => "vi",
        Lang::Yid => "yi",
        Lang::Zul => "zu",
        other => other.code(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLanguage(String);

impl DetectedLanguage {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for DetectedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DetectedLanguage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Detects the language of the first `sample_segments` segments.
///
/// Never fails: blank input, identifier errors and empty rankings all map to
/// [`DetectedLanguage::unknown`].
pub fn detect_language(
    identifier: &dyn LanguageIdentifier,
    segments: &[String],
    sample_segments: usize,
) -> DetectedLanguage {
    try_detect(identifier, segments, sample_segments)
        .map(DetectedLanguage)
        .unwrap_or_else(DetectedLanguage::unknown)
}

fn try_detect(
    identifier: &dyn LanguageIdentifier,
    segments: &[String],
    sample_segments: usize,
) -> Option<String> {
    if segments.iter().all(|s| is_blank(s)) {
        return None;
    }
    let sample = segments
        .iter()
        .take(sample_segments.max(1))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    let ranked = match identifier.identify(&sample) {
        Ok(ranked) => ranked,
        Err(err) => {
            warn!("language detection failed: {err:#}");
            return None;
        }
    };
    debug!(?ranked, "language candidates");
    ranked.first().and_then(|top| strip_confidence(top))
}

/// `"en:0.9999"` -> `"en"`.
pub fn strip_confidence(candidate: &str) -> Option<String> {
    let label = candidate.split(':').next().unwrap_or("").trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}
