//! Keyword vocabularies and static score tables for effort scoring.
//!
//! Vocabularies are plain data: deserialised from config (or the built-in
//! defaults) and compiled once into [`KeywordSets`] when the selector is
//! built. Scoring logic never embeds word lists.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisType, DetailLevel};

/// Score used for anything the tables do not know about.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Keyword vocabularies, as configured.
///
/// ```toml
/// [effort.keywords]
/// simple = ["emoji", "color"]
/// complex = ["diagnose", "architecture"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortKeywords {
    pub simple: Vec<String>,
    pub medium: Vec<String>,
    pub complex: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

impl Default for EffortKeywords {
    fn default() -> Self {
        Self {
            simple: words(&[
                "emoji", "emoticon", "color", "colour", "count", "quick", "simple", "basic",
                "brief", "briefly", "icon", "logo", "name",
            ]),
            medium: words(&[
                "describe", "explain", "summarize", "summarise", "summary", "read", "extract",
                "compare", "list", "caption", "transcribe", "text", "identify",
            ]),
            complex: words(&[
                "analyze", "analyse", "analysis", "diagnose", "diagnosis", "evaluate", "assess",
                "architecture", "reasoning", "interpret", "debug", "schematic", "thorough",
                "comprehensive", "detailed", "critique", "infer",
            ]),
        }
    }
}

/// Compiled, lowercase keyword sets.
#[derive(Debug, Clone)]
pub struct KeywordSets {
    simple: HashSet<String>,
    medium: HashSet<String>,
    complex: HashSet<String>,
}

impl KeywordSets {
    pub fn compile(keywords: &EffortKeywords) -> Self {
        let set = |list: &[String]| list.iter().map(|w| w.trim().to_lowercase()).collect();
        Self {
            simple: set(&keywords.simple),
            medium: set(&keywords.medium),
            complex: set(&keywords.complex),
        }
    }

    /// Score query text by vocabulary overlap, falling back to length.
    ///
    /// Empty or whitespace-only text scores neutral.
    pub fn query_text_score(&self, query: &str) -> f64 {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return NEUTRAL_SCORE;
        }
        let overlap = |set: &HashSet<String>| tokens.iter().filter(|t| set.contains(*t)).count();

        let simple = overlap(&self.simple);
        let complex = overlap(&self.complex);
        let medium = overlap(&self.medium);

        if simple >= 2 {
            10.0
        } else if simple >= 1 {
            25.0
        } else if complex >= 2 {
            90.0
        } else if complex >= 1 {
            75.0
        } else if medium >= 1 {
            50.0
        } else {
            let word_count = query.split_whitespace().count();
            if word_count <= 3 {
                20.0
            } else if word_count <= 10 {
                40.0
            } else {
                60.0
            }
        }
    }
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self::compile(&EffortKeywords::default())
    }
}

/// Distinct lowercase alphanumeric tokens.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn analysis_type_score(analysis_type: &AnalysisType) -> f64 {
    match analysis_type {
        AnalysisType::General => 20.0,
        AnalysisType::Ocr => 40.0,
        AnalysisType::Document => 55.0,
        AnalysisType::Chart => 60.0,
        AnalysisType::Technical => 75.0,
        AnalysisType::Medical => 85.0,
        AnalysisType::Comprehensive => 95.0,
        AnalysisType::Other(_) => NEUTRAL_SCORE,
    }
}

pub fn detail_level_score(detail_level: &DetailLevel) -> f64 {
    match detail_level {
        DetailLevel::Basic => 20.0,
        DetailLevel::Standard => 50.0,
        DetailLevel::Detailed => 70.0,
        DetailLevel::Comprehensive => 90.0,
        DetailLevel::Other(_) => NEUTRAL_SCORE,
    }
}

pub fn specific_questions_score(count: usize) -> f64 {
    match count {
        0 => 30.0,
        1 => 40.0,
        2..=3 => 60.0,
        _ => 80.0,
    }
}
