use std::collections::HashMap;

use tracing::info;

use crate::model::{EventId, TriggerHit};

/// Per-run scoring state for one instrument.
#[derive(Debug, Default)]
pub struct InstrumentLedger {
    pub score: i64,
    pub reasons: String,
    pub top_score: i64,
    pub top_reasons: String,
    pub bottom_score: i64,
    pub bottom_reasons: String,
    seen: HashMap<EventId, u32>,
}

/// Alert and scoring ledger for one run.
///
/// Dedups trigger events per (instrument, identity): backtest sweeps
/// revisit overlapping day windows, and the same conceptual occurrence
/// must score exactly once. Fresh events accumulate the running score and
/// reason trail and refresh the max/min snapshots used for reporting.
/// Never persisted; a run starts empty.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: HashMap<String, InstrumentLedger>,
    alerts: Vec<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one trigger hit. A repeat identity only bumps its counter
    /// and returns false.
    pub fn record(&mut self, symbol: &str, hit: &TriggerHit) -> bool {
        let entry = self.entries.entry(symbol.to_string()).or_default();
        if let Some(count) = entry.seen.get_mut(&hit.id) {
            *count += 1;
            return false;
        }
        entry.seen.insert(hit.id, 1);

        entry.score += hit.signal.magnitude();
        if entry.reasons.is_empty() {
            entry.reasons.clone_from(&hit.message);
        } else {
            entry.reasons.push_str(", ");
            entry.reasons.push_str(&hit.message);
        }

        let trail = if hit.days_ago > 0 {
            format!("{} days ago: {}", hit.days_ago, entry.reasons)
        } else {
            entry.reasons.clone()
        };
        if entry.top_score <= entry.score {
            entry.top_score = entry.score;
            entry.top_reasons.clone_from(&trail);
        }
        if entry.bottom_score >= entry.score {
            entry.bottom_score = entry.score;
            entry.bottom_reasons = trail;
        }

        let line = format!(
            "{} {} \t [{}] {} ago",
            hit.signal.prefix(),
            symbol,
            hit.message,
            hit.days_ago
        );
        info!("{line}");
        self.alerts.push(line);
        true
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    #[cfg(test)]
    pub fn entry(&self, symbol: &str) -> Option<&InstrumentLedger> {
        self.entries.get(symbol)
    }

    /// How many times an identity has been detected this run (0 = never).
    #[cfg(test)]
    pub fn repeat_count(&self, symbol: &str, id: EventId) -> u32 {
        self.entries
            .get(symbol)
            .and_then(|e| e.seen.get(&id))
            .copied()
            .unwrap_or(0)
    }

    /// Max-score snapshot per instrument, unsorted.
    pub fn tops(&self) -> Vec<(&str, i64, &str)> {
        self.entries
            .iter()
            .map(|(symbol, e)| (symbol.as_str(), e.top_score, e.top_reasons.as_str()))
            .collect()
    }

    /// Min-score snapshot per instrument, unsorted.
    pub fn bottoms(&self) -> Vec<(&str, i64, &str)> {
        self.entries
            .iter()
            .map(|(symbol, e)| (symbol.as_str(), e.bottom_score, e.bottom_reasons.as_str()))
            .collect()
    }
}
