use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_keys: Vec<String>,
    pub port: u16,
    pub rust_log: String,
    pub dispatch: DispatchSettings,
}

/// Tuning knobs for the batch dispatcher and the per-resume analysis call.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Documents analysed concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches, paces the outbound call rate.
    pub batch_pause: Duration,
    /// Upper bound on one remote analysis call.
    pub call_timeout: Duration,
    /// Resume text beyond this many characters is not sent to the model.
    pub max_document_chars: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause: Duration::from_millis(100),
            call_timeout: Duration::from_secs(30),
            max_document_chars: 12_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_keys = lookup("LLM_API_KEYS")
            .context("Required environment variable 'LLM_API_KEYS' is not set")?;
        let llm_api_keys = parse_key_list(&raw_keys);
        if llm_api_keys.is_empty() {
            bail!("LLM_API_KEYS must contain at least one non-empty key");
        }

        let defaults = DispatchSettings::default();
        let batch_size = parse_or(&lookup, "SCREENING_BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            bail!("SCREENING_BATCH_SIZE must be at least 1");
        }

        Ok(Config {
            llm_api_keys,
            port: parse_or(&lookup, "PORT", 8080u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            dispatch: DispatchSettings {
                batch_size,
                batch_pause: Duration::from_millis(parse_or(
                    &lookup,
                    "SCREENING_BATCH_PAUSE_MS",
                    defaults.batch_pause.as_millis() as u64,
                )?),
                call_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "LLM_CALL_TIMEOUT_SECS",
                    defaults.call_timeout.as_secs(),
                )?),
                max_document_chars: parse_or(
                    &lookup,
                    "SCREENING_MAX_DOCUMENT_CHARS",
                    defaults.max_document_chars,
                )?,
            },
        })
    }
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
