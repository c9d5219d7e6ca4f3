//! Credential Pool — API key selection with per-key health tracking.
//!
//! Each key carries a small circuit breaker:
//!
//! ```text
//! +--------+   3 failures    +------+
//! | Closed | --------------> | Open |
//! +--------+                 +------+
//!     ^                         |
//!     |  1 success, or recovery trial (idle > 60s, lowest failure count)
//!     +-------------------------+
//! ```
//!
//! Selection prefers the least recently used Closed key. When every key is
//! Open, the idle key with the fewest failures is forced Closed and tried again.
//! There is no backoff and no jitter.
//!
//! The whole table sits behind one mutex; no operation holds it across an await.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Consecutive failures (net of successes) that open a key's circuit.
pub const FAILURE_THRESHOLD: u32 = 3;

/// How long an Open key must sit unused before it can be tried again.
pub const RECOVERY_IDLE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy; eligible for normal selection.
    Closed,
    /// Unhealthy; only reachable through the recovery trial.
    Open,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("credential pool requires at least one API key")]
    Empty,
}

#[derive(Debug, Error)]
#[error("all {total} API keys are unhealthy and none has been idle long enough to retry")]
pub struct PoolExhausted {
    pub total: usize,
}

/// Handle to one selected key. Cheap to clone; never prints the secret.
#[derive(Clone)]
pub struct Credential {
    index: usize,
    secret: Arc<str>,
    label: Arc<str>,
}

impl Credential {
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("label", &self.label)
            .finish()
    }
}

/// Serializable health view of one key, for the credentials endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialHealth {
    pub label: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Seconds since the key was last selected; `None` if never used.
    pub idle_secs: Option<u64>,
}

struct CredentialSlot {
    secret: Arc<str>,
    label: Arc<str>,
    state: CircuitState,
    failure_count: u32,
    last_used_at: Option<Instant>,
}

impl CredentialSlot {
    fn handle(&self, index: usize) -> Credential {
        Credential {
            index,
            secret: Arc::clone(&self.secret),
            label: Arc::clone(&self.label),
        }
    }

    fn idle_longer_than(&self, now: Instant, idle: Duration) -> bool {
        self.last_used_at
            .map_or(true, |used| now.saturating_duration_since(used) > idle)
    }
}

pub struct CredentialPool {
    slots: Mutex<Vec<CredentialSlot>>,
}

impl CredentialPool {
    /// Builds a pool from the configured keys, in configuration order.
    pub fn new<I, S>(keys: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let slots: Vec<CredentialSlot> = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                CredentialSlot {
                    secret: Arc::from(key),
                    label: Arc::from(mask_secret(key)),
                    state: CircuitState::Closed,
                    failure_count: 0,
                    last_used_at: None,
                }
            })
            .collect();

        if slots.is_empty() {
            return Err(PoolError::Empty);
        }

        info!("Credential pool initialized with {} API keys", slots.len());
        Ok(Self {
            slots: Mutex::new(slots),
        })
    }

    /// Picks the key for the next outbound call and stamps its `last_used_at`.
    pub fn select(&self) -> Result<Credential, PoolExhausted> {
        let now = Instant::now();
        let mut slots = self.slots.lock();

        // Closed keys: least recently used first, never-used keys before any used one.
        let healthy = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == CircuitState::Closed)
            .min_by_key(|(_, slot)| slot.last_used_at)
            .map(|(index, _)| index);

        let index = match healthy {
            Some(index) => index,
            None => {
                let trial = slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.idle_longer_than(now, RECOVERY_IDLE))
                    .min_by_key(|(_, slot)| slot.failure_count)
                    .map(|(index, _)| index)
                    .ok_or(PoolExhausted { total: slots.len() })?;

                let slot = &mut slots[trial];
                slot.state = CircuitState::Closed;
                slot.failure_count = slot.failure_count.saturating_sub(1);
                warn!(
                    "All API keys unhealthy; retrying {} (failures now {})",
                    slot.label, slot.failure_count
                );
                trial
            }
        };

        let slot = &mut slots[index];
        slot.last_used_at = Some(now);
        debug!("Selected API key {}", slot.label);
        Ok(slot.handle(index))
    }

    pub fn report_success(&self, credential: &Credential) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(credential.index) {
            slot.failure_count = slot.failure_count.saturating_sub(1);
            if slot.state == CircuitState::Open {
                info!("API key {} recovered", slot.label);
            }
            slot.state = CircuitState::Closed;
        }
    }

    pub fn report_failure(&self, credential: &Credential) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(credential.index) {
            slot.failure_count += 1;
            if slot.failure_count >= FAILURE_THRESHOLD && slot.state == CircuitState::Closed {
                slot.state = CircuitState::Open;
                warn!(
                    "API key {} marked unhealthy after {} failures",
                    slot.label, slot.failure_count
                );
            }
        }
    }

    pub fn snapshot(&self) -> Vec<CredentialHealth> {
        let now = Instant::now();
        self.slots
            .lock()
            .iter()
            .map(|slot| CredentialHealth {
                label: slot.label.to_string(),
                state: slot.state,
                failure_count: slot.failure_count,
                idle_secs: slot
                    .last_used_at
                    .map(|used| now.saturating_duration_since(used).as_secs()),
            })
            .collect()
    }
}

/// Log-safe label for a key: `sk-a…wxyz`, or `****` for short keys.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
