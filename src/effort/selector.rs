//! Heuristic effort selection.
//!
//! A weighted score over four request features picks a tier, then a fixed
//! sequence of overrides may replace it. Every override that fires is named
//! in the decision's rationale. Selection is total: anything the tables do
//! not recognise scores neutral.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keywords::{
    EffortKeywords, KeywordSets, analysis_type_score, detail_level_score, specific_questions_score,
};
use super::stats::{DEFAULT_LEARNING_RATE, EffortStats, TierEstimate};
use crate::telemetry;
use crate::types::{AnalysisRequest, AnalysisType, DetailLevel, EffortTier};

const QUERY_WEIGHT: f64 = 0.4;
const TYPE_WEIGHT: f64 = 0.3;
const DETAIL_WEIGHT: f64 = 0.2;
const QUESTIONS_WEIGHT: f64 = 0.1;

static FAST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[fast\]|\bfast\s+analysis\b|\bquick\s+(look|glance)\b")
        .expect("fast marker regex")
});

static ULTRA_SIMPLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\s*what\s+(emoji|emoticon|icon|logo|flag|colou?r)\s+(is|are)\s+(this|that|these|it)\s*\??\s*$",
        r"(?i)^\s*is\s+(this|that|it)\s+an?\s+\w+\s*\??\s*$",
        r"(?i)^\s*(what|which)\s+colou?rs?\b",
        r"(?i)^\s*how\s+many\s+\w+(\s+are\s+there)?\s*\??\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("ultra-simple regex"))
    .collect()
});

static TECHNICAL_OR_MEDICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(x-?ray|mri|ct\s+scan|ultrasound|radiolog\w*|diagnos\w*|medical|clinical|symptoms?|patholog\w*|lesions?|tumou?rs?|circuit|schematics?|wiring|stack\s+trace|error\s+log|blueprints?|engineering\s+drawings?)\b",
    )
    .expect("technical regex")
});

/// Per-request inputs to effort selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffortContext {
    pub query_text: String,
    pub analysis_type: AnalysisType,
    pub detail_level: DetailLevel,
    pub specific_questions: Vec<String>,
    /// Approximate decoded size of an inline image, if known.
    pub image_size_hint: Option<usize>,
}

impl EffortContext {
    pub fn from_request(request: &AnalysisRequest) -> Self {
        Self {
            query_text: request.query.clone(),
            analysis_type: request.analysis_type.clone(),
            detail_level: request.detail_level.clone(),
            specific_questions: request.specific_questions.clone(),
            image_size_hint: request.image.inline_size_hint(),
        }
    }
}

/// Effort selection settings.
///
/// ```toml
/// [effort]
/// learning_rate = 0.1
/// small_inline_bytes = 2048
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortConfig {
    /// EMA learning rate for latency/success estimates. Default: 0.1.
    pub learning_rate: f64,
    /// Inline payloads smaller than this force the minimal tier.
    /// Default: 2,048 bytes.
    pub small_inline_bytes: usize,
    pub keywords: EffortKeywords,
}

impl Default for EffortConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            small_inline_bytes: 2_048,
            keywords: EffortKeywords::default(),
        }
    }
}

impl EffortConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learning_rate(mut self, alpha: f64) -> Self {
        self.learning_rate = alpha;
        self
    }

    pub fn small_inline_bytes(mut self, bytes: usize) -> Self {
        self.small_inline_bytes = bytes;
        self
    }

    pub fn keywords(mut self, keywords: EffortKeywords) -> Self {
        self.keywords = keywords;
        self
    }
}

/// Outcome of [`EffortSelector::choose_effort`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortDecision {
    pub tier: EffortTier,
    /// Weighted 0-100 score before overrides.
    pub score: f64,
    pub rationale: String,
    pub estimated_latency: Duration,
    pub estimated_success_rate: f64,
    /// Whether an override replaced the score-derived tier.
    pub overridden: bool,
}

/// Chooses an effort tier per request and learns per-tier estimates.
#[derive(Debug)]
pub struct EffortSelector {
    keywords: KeywordSets,
    small_inline_bytes: usize,
    stats: EffortStats,
}

impl EffortSelector {
    pub fn new(config: &EffortConfig) -> Self {
        Self {
            keywords: KeywordSets::compile(&config.keywords),
            small_inline_bytes: config.small_inline_bytes,
            stats: EffortStats::new(config.learning_rate),
        }
    }

    pub fn choose_effort(&self, ctx: &EffortContext) -> EffortDecision {
        let query = self.keywords.query_text_score(&ctx.query_text);
        let kind = analysis_type_score(&ctx.analysis_type);
        let detail = detail_level_score(&ctx.detail_level);
        let questions = specific_questions_score(ctx.specific_questions.len());

        let score = QUERY_WEIGHT * query
            + TYPE_WEIGHT * kind
            + DETAIL_WEIGHT * detail
            + QUESTIONS_WEIGHT * questions;
        let scored = EffortTier::from_score(score);

        let mut tier = scored;
        let mut notes = vec![format!(
            "score {score:.1} (query {query}, type {kind}, detail {detail}, questions {questions}) -> {scored}"
        )];

        if FAST_MARKER.is_match(&ctx.query_text) {
            tier = EffortTier::Minimal;
            notes.push("fast-analysis marker forces minimal".to_string());
        }
        if ULTRA_SIMPLE.iter().any(|re| re.is_match(&ctx.query_text)) {
            tier = EffortTier::Minimal;
            notes.push("ultra-simple question forces minimal".to_string());
        }
        if TECHNICAL_OR_MEDICAL.is_match(&ctx.query_text) && tier < EffortTier::Medium {
            tier = EffortTier::Medium;
            notes.push("technical or medical content raises to medium".to_string());
        }
        if let Some(size) = ctx.image_size_hint
            && size < self.small_inline_bytes
        {
            tier = EffortTier::Minimal;
            notes.push(format!(
                "inline image of ~{size} bytes is below {} and forces minimal",
                self.small_inline_bytes
            ));
        }

        let estimate = self.stats.estimate(tier);
        let decision = EffortDecision {
            tier,
            score,
            rationale: notes.join("; "),
            estimated_latency: Duration::from_secs_f64(estimate.avg_latency_secs.max(0.0)),
            estimated_success_rate: estimate.success_rate,
            overridden: tier != scored,
        };

        debug!(
            tier = %decision.tier,
            score = decision.score,
            overridden = decision.overridden,
            "effort selected"
        );
        metrics::counter!(telemetry::EFFORT_SELECTIONS_TOTAL, "tier" => tier.as_str()).increment(1);

        decision
    }

    /// Fold a completed backend call into the tier's estimates.
    pub fn record_outcome(&self, tier: EffortTier, latency: Duration, success: bool) {
        self.stats.record(tier, latency, success);
    }

    /// Current per-tier estimates, cheapest first.
    pub fn stats(&self) -> Vec<TierEstimate> {
        self.stats.snapshot()
    }
}

impl Default for EffortSelector {
    fn default() -> Self {
        Self::new(&EffortConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(query: &str) -> EffortContext {
        EffortContext {
            query_text: query.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn weighted_score_maps_to_tier() {
        let selector = EffortSelector::default();
        // describe: 50, general 20, standard 50, no questions 30
        // 0.4*50 + 0.3*20 + 0.2*50 + 0.1*30 = 39
        let d = selector.choose_effort(&ctx("describe the scene please"));
        assert!((d.score - 39.0).abs() < 1e-9);
        assert_eq!(d.tier, EffortTier::Low);
        assert!(!d.overridden);
    }

    #[test]
    fn empty_context_is_neutral() {
        let d = EffortSelector::default().choose_effort(&EffortContext::default());
        // 0.4*50 + 0.3*20 + 0.2*50 + 0.1*30 = 39
        assert_eq!(d.tier, EffortTier::Low);
        assert!(d.score.is_finite());
    }

    #[test]
    fn fast_marker_forces_minimal() {
        let mut c = ctx("[fast] analyze and evaluate the architecture");
        c.analysis_type = AnalysisType::Comprehensive;
        let d = EffortSelector::default().choose_effort(&c);
        assert_eq!(d.tier, EffortTier::Minimal);
        assert!(d.overridden);
        assert!(d.rationale.contains("fast-analysis"));
    }

    #[test]
    fn ultra_simple_patterns() {
        let selector = EffortSelector::default();
        for q in [
            "what emoji is this?",
            "What colour is it",
            "is this a cat?",
            "how many dogs are there?",
        ] {
            let mut c = ctx(q);
            c.detail_level = DetailLevel::Comprehensive;
            assert_eq!(selector.choose_effort(&c).tier, EffortTier::Minimal, "{q}");
        }
    }

    #[test]
    fn technical_content_raises_to_at_least_medium() {
        let selector = EffortSelector::default();
        let d = selector.choose_effort(&ctx("what does this x-ray show"));
        assert_eq!(d.tier, EffortTier::Medium);
        assert!(d.rationale.contains("technical"));

        let mut c = ctx("diagnose the circuit and evaluate the schematic in depth");
        c.analysis_type = AnalysisType::Medical;
        c.detail_level = DetailLevel::Comprehensive;
        c.specific_questions = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let d = selector.choose_effort(&c);
        assert_eq!(d.tier, EffortTier::High);
        assert!(!d.overridden);
    }

    #[test]
    fn later_overrides_win() {
        // Small inline payload runs last and lowers a technical raise.
        let mut c = ctx("check this mri");
        c.image_size_hint = Some(512);
        let d = EffortSelector::default().choose_effort(&c);
        assert_eq!(d.tier, EffortTier::Minimal);
        assert!(d.rationale.contains("technical"));
        assert!(d.rationale.contains("inline image"));
    }

    #[test]
    fn large_inline_payload_does_not_override() {
        let mut c = ctx("describe the scene please");
        c.image_size_hint = Some(500_000);
        let d = EffortSelector::default().choose_effort(&c);
        assert_eq!(d.tier, EffortTier::Low);
        assert!(!d.overridden);
    }

    #[test]
    fn estimates_follow_recorded_outcomes() {
        let selector = EffortSelector::new(&EffortConfig::new().learning_rate(1.0));
        selector.record_outcome(EffortTier::Low, Duration::from_secs(9), false);
        let d = selector.choose_effort(&ctx("describe the scene please"));
        assert_eq!(d.tier, EffortTier::Low);
        assert_eq!(d.estimated_latency, Duration::from_secs(9));
        assert_eq!(d.estimated_success_rate, 0.0);
    }

    #[test]
    fn context_from_request() {
        let req = AnalysisRequest::new(
            crate::types::ImageRef::inline("data:image/png;base64,AAAA"),
            "what is it",
        )
        .analysis_type("chart")
        .question("why?");
        let c = EffortContext::from_request(&req);
        assert_eq!(c.analysis_type, AnalysisType::Chart);
        assert_eq!(c.specific_questions.len(), 1);
        assert_eq!(c.image_size_hint, Some(3));
    }
}
