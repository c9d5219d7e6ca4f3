//! Keyword Index — static skills lexicon plus a case-insensitive substring matcher.
//!
//! Used two ways:
//! - quick keyword extraction from a job description (cached by `keyword_cache`)
//! - deterministic fallback scoring when the remote analysis is unusable

use crate::models::candidate::{clamp_percentage, AnalysisResult, AnalysisSource};

// ────────────────────────────────────────────────────────────────────────────
// Lexicon
// ────────────────────────────────────────────────────────────────────────────

/// Skills and traits looked for in both resumes and job descriptions.
/// Extraction results follow this order, not occurrence order in the text.
pub const LEXICON: &[&str] = &[
    "javascript",
    "typescript",
    "react",
    "node",
    "python",
    "java",
    "sql",
    "aws",
    "docker",
    "kubernetes",
    "agile",
    "scrum",
    "leadership",
    "management",
    "communication",
    "problem solving",
    "team player",
    "git",
    "api",
    "rest",
    "graphql",
    "mongodb",
    "postgresql",
    "ci/cd",
    "testing",
    "tdd",
    "microservices",
    "cloud",
    "devops",
    "frontend",
    "backend",
    "full stack",
    "mobile",
    "ios",
    "android",
    "machine learning",
    "ai",
    "data analysis",
    "analytics",
    "excel",
    "powerpoint",
    "project management",
];

/// Max keywords reported on a fallback result.
pub const FALLBACK_KEYWORD_LIMIT: usize = 5;

const FALLBACK_STRENGTH: &str =
    "Keyword overlap with the job description was measured; detailed AI analysis was unavailable.";
const FALLBACK_WEAKNESS: &str =
    "AI analysis failed for this resume; the score is based on keyword overlap only.";
const FALLBACK_SUMMARY: &str = "Automated analysis was unavailable for this resume. \
    The match score reflects how many of the job's keywords appear in the resume.";

// ────────────────────────────────────────────────────────────────────────────
// Extraction and scoring
// ────────────────────────────────────────────────────────────────────────────

/// Returns every lexicon entry that occurs in `text` (case-insensitive substring match).
///
/// Substring semantics are deliberate and coarse: "java" also matches "javascript".
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    LEXICON
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

/// Keywords present in both lists, in the document list's order.
pub fn matched_keywords(job_keywords: &[String], document_keywords: &[String]) -> Vec<String> {
    document_keywords
        .iter()
        .filter(|keyword| job_keywords.contains(keyword))
        .cloned()
        .collect()
}

/// `round(|job ∩ document| / |job| × 100)`; 0 when the job has no keywords.
pub fn keyword_overlap_score(job_keywords: &[String], document_keywords: &[String]) -> u8 {
    if job_keywords.is_empty() {
        return 0;
    }
    let matched = matched_keywords(job_keywords, document_keywords).len();
    clamp_percentage(matched as f64 / job_keywords.len() as f64 * 100.0)
}

/// Builds the degraded-path result from keyword overlap alone.
pub fn fallback_analysis(job_keywords: &[String], document_text: &str) -> AnalysisResult {
    let document_keywords = extract_keywords(document_text);
    let match_percentage = keyword_overlap_score(job_keywords, &document_keywords);

    let mut matched = matched_keywords(job_keywords, &document_keywords);
    matched.truncate(FALLBACK_KEYWORD_LIMIT);

    AnalysisResult {
        match_percentage,
        matched_keywords: matched,
        strengths: vec![FALLBACK_STRENGTH.to_string()],
        weaknesses: vec![FALLBACK_WEAKNESS.to_string()],
        summary: FALLBACK_SUMMARY.to_string(),
        source: AnalysisSource::Fallback,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
