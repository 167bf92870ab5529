//! Tests for effort selection: scoring, overrides, totality and feedback.

use std::time::Duration;

use huginn::effort::{EffortConfig, EffortContext, EffortKeywords, EffortSelector};
use huginn::{AnalysisRequest, AnalysisType, DetailLevel, EffortTier, ImageRef};

fn ctx(query: &str, analysis_type: &str, detail_level: &str, questions: usize) -> EffortContext {
    EffortContext {
        query_text: query.to_string(),
        analysis_type: AnalysisType::from(analysis_type),
        detail_level: DetailLevel::from(detail_level),
        specific_questions: (0..questions).map(|i| format!("question {i}")).collect(),
        image_size_hint: None,
    }
}

#[test]
fn emoji_question_is_forced_minimal() {
    let selector = EffortSelector::default();
    let decision = selector.choose_effort(&ctx("what emoji is this?", "general", "basic", 0));
    assert_eq!(decision.tier, EffortTier::Minimal);
    assert!(decision.rationale.contains("ultra-simple"));
}

#[test]
fn heavy_technical_request_is_high() {
    let selector = EffortSelector::default();
    let decision = selector.choose_effort(&ctx(
        "analyze the detailed architecture",
        "technical",
        "comprehensive",
        4,
    ));
    assert!(decision.score >= 75.0, "score {}", decision.score);
    assert_eq!(decision.tier, EffortTier::High);
    assert!(!decision.overridden);
}

#[test]
fn selection_is_total() {
    let selector = EffortSelector::default();
    let inputs = [
        ctx("", "", "", 0),
        ctx("   ", "astrology", "ultra", 0),
        ctx("!!!", "GENERAL", "Basic", 12),
        ctx(&"word ".repeat(10_000), "medical", "comprehensive", 100),
        ctx("🦊🦊🦊", "chart", "detailed", 1),
    ];
    for input in &inputs {
        let decision = selector.choose_effort(input);
        assert!(EffortTier::ALL.contains(&decision.tier));
        assert!((0.0..=100.0).contains(&decision.score));
        assert!(!decision.rationale.is_empty());
    }
}

#[test]
fn unknown_values_score_neutral() {
    let selector = EffortSelector::default();
    // Unknown type and level both score 50, same as an empty query.
    // 0.4*50 + 0.3*50 + 0.2*50 + 0.1*30 = 48
    let decision = selector.choose_effort(&ctx("", "astrology", "ultra", 0));
    assert!((decision.score - 48.0).abs() < 1e-9);
    assert_eq!(decision.tier, EffortTier::Low);
}

#[test]
fn analysis_type_parsing_is_case_insensitive() {
    let selector = EffortSelector::default();
    let lower = selector.choose_effort(&ctx("x", "medical", "standard", 0));
    let upper = selector.choose_effort(&ctx("x", "MEDICAL", "Standard", 0));
    assert_eq!(lower.score, upper.score);
}

#[test]
fn fast_marker_beats_heavy_score() {
    let selector = EffortSelector::default();
    let decision = selector.choose_effort(&ctx(
        "fast analysis please: evaluate and interpret everything",
        "comprehensive",
        "comprehensive",
        6,
    ));
    assert_eq!(decision.tier, EffortTier::Minimal);
    assert!(decision.overridden);
}

#[test]
fn medical_imagery_is_at_least_medium() {
    let selector = EffortSelector::default();
    let decision = selector.choose_effort(&ctx("anything odd on this ultrasound", "general", "basic", 0));
    assert_eq!(decision.tier, EffortTier::Medium);
    assert!(decision.overridden);
}

#[test]
fn tiny_inline_image_forces_minimal() {
    let selector = EffortSelector::default();
    let request = AnalysisRequest::new(
        ImageRef::inline("data:image/gif;base64,R0lGODlhAQABAAAAACw="),
        "evaluate the composition and interpret the symbolism",
    )
    .analysis_type("comprehensive");
    let decision = selector.choose_effort(&EffortContext::from_request(&request));
    assert_eq!(decision.tier, EffortTier::Minimal);
    assert!(decision.rationale.contains("inline image"));
}

#[test]
fn configured_keywords_change_scoring() {
    let config = EffortConfig::new().keywords(EffortKeywords {
        simple: vec![],
        medium: vec![],
        complex: vec!["forensic".into(), "provenance".into()],
    });
    let selector = EffortSelector::new(&config);
    let decision = selector.choose_effort(&ctx("forensic provenance review", "general", "standard", 0));
    // 0.4*90 + 0.3*20 + 0.2*50 + 0.1*30 = 55
    assert!((decision.score - 55.0).abs() < 1e-9);
    assert_eq!(decision.tier, EffortTier::Medium);

    let default = EffortSelector::default();
    let baseline = default.choose_effort(&ctx("forensic provenance review", "general", "standard", 0));
    assert_eq!(baseline.tier, EffortTier::Low);
}

#[test]
fn outcomes_nudge_estimates() {
    let selector = EffortSelector::default();
    let before = selector.stats();
    let medium_before = before.iter().find(|e| e.tier == EffortTier::Medium).unwrap();

    selector.record_outcome(EffortTier::Medium, Duration::from_secs(112), true);

    let after = selector.stats();
    let medium_after = after.iter().find(|e| e.tier == EffortTier::Medium).unwrap();
    // 0.9 * 12 + 0.1 * 112 = 22
    assert!((medium_after.avg_latency_secs - 22.0).abs() < 1e-9);
    assert!(medium_after.success_rate > medium_before.success_rate);
    assert_eq!(medium_after.samples, 1);

    // Other tiers untouched.
    assert_eq!(after[0], before[0]);
}

#[test]
fn decision_carries_tier_estimates() {
    let selector = EffortSelector::default();
    let decision = selector.choose_effort(&ctx("what emoji is this?", "general", "basic", 0));
    assert_eq!(decision.estimated_latency, Duration::from_secs(2));
    assert!((decision.estimated_success_rate - 0.98).abs() < 1e-9);
}

#[test]
fn decision_serializes_for_display() {
    let selector = EffortSelector::default();
    let decision = selector.choose_effort(&ctx("describe it", "document", "detailed", 2));
    let json = serde_json::to_value(&decision).unwrap();
    assert_eq!(json["tier"], decision.tier.as_str());
    assert!(json["rationale"].as_str().unwrap().contains("score"));
}
