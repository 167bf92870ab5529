//! Analysis request types

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::signature::ContentSignature;

/// Where the image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ImageSource {
    /// Remote image fetched on demand.
    Url(String),
    /// Inline payload: a `data:` URL or bare base64.
    Inline(String),
}

/// Opaque image reference plus its lazily computed content signature.
///
/// Clones share the signature cell, so the (possibly remote) signature
/// pipeline runs at most once per logical image even when both the cache
/// lookup and the cache store ask for it.
#[derive(Clone)]
pub struct ImageRef {
    source: ImageSource,
    signature: Arc<OnceCell<ContentSignature>>,
}

impl ImageRef {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            signature: Arc::new(OnceCell::new()),
        }
    }

    /// Reference a remote image.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(ImageSource::Url(url.into()))
    }

    /// Reference an inline image (data URL or bare base64).
    pub fn inline(data: impl Into<String>) -> Self {
        Self::new(ImageSource::Inline(data.into()))
    }

    /// Classify a raw reference string: `data:` URLs are inline, anything
    /// else is treated as a remote URL.
    pub fn parse(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        if reference.starts_with("data:") {
            Self::inline(reference)
        } else {
            Self::url(reference)
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// The raw reference string (URL or inline payload).
    pub fn reference(&self) -> &str {
        match &self.source {
            ImageSource::Url(url) => url,
            ImageSource::Inline(data) => data,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.source, ImageSource::Inline(_))
    }

    /// Approximate decoded size of an inline payload in bytes.
    ///
    /// `None` for remote images, whose size is unknown until fetched.
    pub fn inline_size_hint(&self) -> Option<usize> {
        match &self.source {
            ImageSource::Inline(data) => {
                let payload = data.split_once(',').map_or(data.as_str(), |(_, p)| p);
                let payload = payload.trim_end_matches('=');
                Some(payload.len() * 3 / 4)
            }
            ImageSource::Url(_) => None,
        }
    }

    pub(crate) fn signature_cell(&self) -> &OnceCell<ContentSignature> {
        &self.signature
    }

    /// The signature, if it has already been computed.
    pub fn cached_signature(&self) -> Option<&ContentSignature> {
        self.signature.get()
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reference = self.reference();
        let shown = if reference.len() > 64 {
            let head: String = reference.chars().take(64).collect();
            format!("{head}… ({} bytes)", reference.len())
        } else {
            reference.to_string()
        };
        f.debug_struct("ImageRef")
            .field("inline", &self.is_inline())
            .field("reference", &shown)
            .field("signature", &self.signature.get())
            .finish()
    }
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Kind of analysis requested.
///
/// Unknown values are preserved in [`AnalysisType::Other`] so scoring can
/// fall back to a neutral weight instead of rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnalysisType {
    #[default]
    General,
    Ocr,
    Document,
    Chart,
    Technical,
    Medical,
    Comprehensive,
    Other(String),
}

impl AnalysisType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::General => "general",
            Self::Ocr => "ocr",
            Self::Document => "document",
            Self::Chart => "chart",
            Self::Technical => "technical",
            Self::Medical => "medical",
            Self::Comprehensive => "comprehensive",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for AnalysisType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Self::General,
            "ocr" => Self::Ocr,
            "document" => Self::Document,
            "chart" => Self::Chart,
            "technical" => Self::Technical,
            "medical" => Self::Medical,
            "comprehensive" => Self::Comprehensive,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for AnalysisType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<AnalysisType> for String {
    fn from(value: AnalysisType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested level of detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DetailLevel {
    Basic,
    #[default]
    Standard,
    Detailed,
    Comprehensive,
    Other(String),
}

impl DetailLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for DetailLevel {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Self::Basic,
            "standard" => Self::Standard,
            "detailed" => Self::Detailed,
            "comprehensive" => Self::Comprehensive,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for DetailLevel {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DetailLevel> for String {
    fn from(value: DetailLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One visual-analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub image: ImageRef,
    pub query: String,
    pub analysis_type: AnalysisType,
    pub detail_level: DetailLevel,
    pub specific_questions: Vec<String>,
    /// Caller-supplied cost estimate; the configured default is used if unset.
    pub estimated_cost_usd: Option<f64>,
}

impl AnalysisRequest {
    pub fn new(image: ImageRef, query: impl Into<String>) -> Self {
        Self {
            image,
            query: query.into(),
            analysis_type: AnalysisType::default(),
            detail_level: DetailLevel::default(),
            specific_questions: Vec::new(),
            estimated_cost_usd: None,
        }
    }

    pub fn analysis_type(mut self, analysis_type: impl Into<AnalysisType>) -> Self {
        self.analysis_type = analysis_type.into();
        self
    }

    pub fn detail_level(mut self, detail_level: impl Into<DetailLevel>) -> Self {
        self.detail_level = detail_level.into();
        self
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.specific_questions.push(question.into());
        self
    }

    pub fn questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specific_questions
            .extend(questions.into_iter().map(Into::into));
        self
    }

    pub fn estimated_cost(mut self, usd: f64) -> Self {
        self.estimated_cost_usd = Some(usd);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_data_urls() {
        assert!(ImageRef::parse("data:image/png;base64,AAAA").is_inline());
        assert!(!ImageRef::parse("https://example.com/cat.png").is_inline());
    }

    #[test]
    fn inline_size_hint_skips_data_url_header() {
        let img = ImageRef::inline("data:image/png;base64,QUJDRA==");
        assert_eq!(img.inline_size_hint(), Some(4));
        assert_eq!(ImageRef::url("https://x/y.png").inline_size_hint(), None);
    }

    #[test]
    fn unknown_analysis_type_is_preserved() {
        let t = AnalysisType::from("Astrology");
        assert_eq!(t, AnalysisType::Other("astrology".into()));
        assert_eq!(t.as_str(), "astrology");
    }

    #[test]
    fn analysis_type_serde_uses_plain_strings() {
        let t: AnalysisType = serde_json::from_str("\"OCR\"").unwrap();
        assert_eq!(t, AnalysisType::Ocr);
        assert_eq!(serde_json::to_string(&AnalysisType::Technical).unwrap(), "\"technical\"");
    }

    #[test]
    fn detail_level_defaults_to_standard() {
        assert_eq!(DetailLevel::default(), DetailLevel::Standard);
        assert_eq!(DetailLevel::from(" Comprehensive "), DetailLevel::Comprehensive);
    }

    #[test]
    fn request_builder_collects_questions() {
        let req = AnalysisRequest::new(ImageRef::url("https://x/y.png"), "describe")
            .analysis_type("technical")
            .detail_level("detailed")
            .question("a")
            .questions(["b", "c"]);
        assert_eq!(req.analysis_type, AnalysisType::Technical);
        assert_eq!(req.detail_level, DetailLevel::Detailed);
        assert_eq!(req.specific_questions, vec!["a", "b", "c"]);
    }
}
