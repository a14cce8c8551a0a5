//! Running token count of the API collaborators.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Shared token ledger. Clones count into the same totals.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    tokens: AtomicU64,
}

/// Point-in-time totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub tokens: u64,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one API call; returns the running token total.
    pub fn record(&self, tokens: u64) -> u64 {
        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        let total = self.counters.tokens.fetch_add(tokens, Ordering::Relaxed) + tokens;
        tracing::debug!(tokens, total, "API token usage");
        total
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.counters.calls.load(Ordering::Relaxed),
            tokens: self.counters.tokens.load(Ordering::Relaxed),
        }
    }
}
