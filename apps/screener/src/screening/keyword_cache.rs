//! Job Keyword Cache — bounded FIFO cache of job-description keyword sets.
//!
//! A screening run analyses many resumes against one job description; the
//! fallback path needs that description's keywords for every resume, so they
//! are extracted once per normalized description.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::screening::keywords::extract_keywords;

pub const JOB_KEYWORD_CACHE_CAPACITY: usize = 10;

/// Thread-safe cache keyed by trimmed, lower-cased job description.
///
/// Eviction is strict insertion order: a hit does not refresh an entry.
pub struct JobKeywordCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Arc<Vec<String>>>,
    insertion_order: VecDeque<String>,
}

impl Default for JobKeywordCache {
    fn default() -> Self {
        Self::with_capacity(JOB_KEYWORD_CACHE_CAPACITY)
    }
}

impl JobKeywordCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the keywords for `job_description`, extracting and caching on a miss.
    pub fn get(&self, job_description: &str) -> Arc<Vec<String>> {
        let key = normalize(job_description);
        let mut state = self.state.lock();

        if let Some(keywords) = state.entries.get(&key) {
            return Arc::clone(keywords);
        }

        let keywords = Arc::new(extract_keywords(&key));
        state.entries.insert(key.clone(), Arc::clone(&keywords));
        state.insertion_order.push_back(key);

        while state.insertion_order.len() > self.capacity {
            if let Some(oldest) = state.insertion_order.pop_front() {
                state.entries.remove(&oldest);
                debug!("Evicted job keyword cache entry ({} chars)", oldest.len());
            }
        }

        keywords
    }
}

#[cfg(test)]
impl JobKeywordCache {
    fn contains(&self, job_description: &str) -> bool {
        self.state
            .lock()
            .entries
            .contains_key(&normalize(job_description))
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
}

fn normalize(job_description: &str) -> String {
    job_description.trim().to_lowercase()
}
