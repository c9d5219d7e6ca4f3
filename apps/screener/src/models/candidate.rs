use serde::{Deserialize, Serialize};

/// Which path produced an `AnalysisResult`. Surfaced to the UI so degraded
/// rows can be marked as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Remote,
    Fallback,
    Unreadable,
}

/// Scored analysis of one resume against one job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Always within 0..=100.
    pub match_percentage: u8,
    pub matched_keywords: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub summary: String,
    pub source: AnalysisSource,
}

impl AnalysisResult {
    /// Zero-score result for a document whose text could not be extracted.
    pub fn unreadable(reason: &str) -> Self {
        Self {
            match_percentage: 0,
            matched_keywords: vec![],
            strengths: vec![],
            weaknesses: vec![format!("Resume could not be read: {reason}")],
            summary: "This resume could not be processed, so no analysis was performed."
                .to_string(),
            source: AnalysisSource::Unreadable,
        }
    }
}

/// One row of the ranked candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub file_name: String,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

impl CandidateRecord {
    pub fn match_percentage(&self) -> u8 {
        self.analysis.match_percentage
    }
}

/// Rounds and clamps a raw score into 0..=100. Non-finite input scores 0.
pub fn clamp_percentage(raw: f64) -> u8 {
    if raw.is_finite() {
        raw.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

/// Sorts candidates by descending match percentage.
/// `sort_by` is stable, so equal scores keep their insertion order.
pub fn rank_candidates(candidates: &mut [CandidateRecord]) {
    candidates.sort_by(|a, b| b.match_percentage().cmp(&a.match_percentage()));
}
