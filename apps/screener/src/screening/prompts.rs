// Screening LLM prompt templates.
// All prompts for the screening module are defined here.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub const ANALYSIS_SYSTEM_PREAMBLE: &str = "\
You are an experienced technical recruiter screening resumes against a job description. \
Judge only what the resume actually states; do not assume skills that are not mentioned.";

pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze how well this resume matches the job description.

JOB DESCRIPTION:
{job_description}

RESUME:
{resume_text}

OUTPUT SCHEMA (return exactly this structure):
{
  "matchPercentage": <integer 0-100>,
  "matchedKeywords": ["skills or requirements from the job description found in the resume"],
  "strengths": ["specific strengths relevant to this role"],
  "weaknesses": ["specific gaps or risks relevant to this role"],
  "summary": "two or three sentences on overall fit"
}"#;

/// Full system prompt for a scored analysis call.
pub fn analysis_system() -> String {
    format!("{ANALYSIS_SYSTEM_PREAMBLE} {JSON_ONLY_SYSTEM}")
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(job_description|resume_text)\}").expect("valid placeholder pattern")
});

/// Fills the template in one pass, so placeholder text inside either input stays literal.
pub fn build_analysis_prompt(resume_text: &str, job_description: &str) -> String {
    PLACEHOLDER
        .replace_all(ANALYSIS_PROMPT_TEMPLATE, |caps: &Captures| match &caps[1] {
            "job_description" => job_description,
            _ => resume_text,
        })
        .into_owned()
}
