use std::fmt;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt, bail};
use serde::{Deserialize, Serialize};

use crate::error::BetError;
use crate::model::{EventId, Signal, TriggerHit};
use crate::trigger::now_index;

const DEFAULT_TARGET_RATIO: f64 = 1.1;
const DEFAULT_STOP_RATIO: f64 = 0.95;
const DEFAULT_DURATION_DAYS: usize = 20;
const DEFAULT_CONFIDENCE: f64 = 33.0;

/// A conditional wager that a price reaches a target before a stop,
/// within a fixed number of bars after its start date. Field names in
/// the serialized form stay short so the bet book on disk remains
/// hand-editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    #[serde(rename = "tk")]
    pub symbol: String,
    /// ISO date the bet opens; bars before it are never inspected.
    #[serde(rename = "ts")]
    pub start_date: String,
    #[serde(rename = "pr")]
    pub entry: f64,
    #[serde(rename = "bt")]
    pub target: f64,
    #[serde(rename = "st")]
    pub stop: f64,
    #[serde(rename = "dy")]
    pub duration: usize,
    #[serde(rename = "cn")]
    pub confidence: f64,
    #[serde(rename = "rc")]
    pub state: BetState,
    #[serde(rename = "rp")]
    pub resolution_price: Option<f64>,
    #[serde(rename = "cm", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetState {
    #[serde(rename = "P")]
    Pending,
    #[serde(rename = "W")]
    Won,
    #[serde(rename = "L")]
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetDirection {
    Long,
    Short,
}

/// Transition result for one evaluation of a pending bet. Terminal bets
/// never transition again, so re-evaluating one yields `Pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum BetOutcome {
    Pending,
    Won(BetResolution),
    Lost(BetResolution),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetResolution {
    pub price: f64,
    pub hit: TriggerHit,
}

impl Bet {
    /// Parse a `price/target/stop/days/confidence/start/comment` spec.
    /// Every field is optional; empty fields keep their defaults, which
    /// derive from the effective entry price. Target and stop accept a
    /// trailing `%` meaning offset from entry.
    pub fn from_spec(
        symbol: &str,
        spec: &str,
        last_close: f64,
        today: NaiveDate,
    ) -> Result<Self, Report<BetError>> {
        let fields: Vec<&str> = spec.split('/').collect();

        let entry = match field(&fields, 0) {
            Some(raw) => number(raw, "price")?,
            None => last_close,
        };

        let target = match field(&fields, 1) {
            Some(raw) => match raw.strip_suffix('%') {
                Some(pct) => entry + entry * number(pct, "target percent")? / 100.0,
                None => number(raw, "target")?,
            },
            None => entry * DEFAULT_TARGET_RATIO,
        };

        let stop = match field(&fields, 2) {
            Some(raw) => match raw.strip_suffix('%') {
                Some(pct) => entry - entry * number(pct, "stop percent")? / 100.0,
                None => number(raw, "stop")?,
            },
            None => entry * DEFAULT_STOP_RATIO,
        };

        let duration = match field(&fields, 3) {
            Some(raw) => raw.parse::<usize>().change_context(BetError::InvalidSpec {
                reason: format!("duration \"{raw}\" is not a day count"),
            })?,
            None => DEFAULT_DURATION_DAYS,
        };

        let confidence = match field(&fields, 4) {
            Some(raw) => number(raw.strip_suffix('%').unwrap_or(raw), "confidence")?,
            None => DEFAULT_CONFIDENCE,
        };

        let start_date = match field(&fields, 5) {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .change_context(BetError::InvalidSpec {
                    reason: format!("start date \"{raw}\" is not YYYY-MM-DD"),
                })?
                .format("%Y-%m-%d")
                .to_string(),
            None => today.format("%Y-%m-%d").to_string(),
        };

        if entry <= 0.0 {
            bail!(BetError::InvalidSpec { reason: format!("entry price {entry} must be positive") });
        }

        Ok(Bet {
            symbol: symbol.to_string(),
            start_date,
            entry,
            target,
            stop,
            duration,
            confidence,
            state: BetState::Pending,
            resolution_price: None,
            comment: field(&fields, 6).map(str::to_string),
        })
    }

    /// Long when the target sits above the entry, short otherwise.
    pub fn direction(&self) -> BetDirection {
        if self.target > self.entry { BetDirection::Long } else { BetDirection::Short }
    }

    pub fn is_pending(&self) -> bool {
        self.state == BetState::Pending
    }

    /// Transition guard: a bet settles once, further calls are no-ops.
    pub fn settle(&mut self, state: BetState, price: f64) {
        if self.state != BetState::Pending {
            return;
        }
        self.state = state;
        self.resolution_price = Some(price);
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: from {:.2} to {:.2} with a stop of {:.2} or {} days (conf {:.2})",
            self.start_date, self.symbol, self.entry, self.target, self.stop, self.duration,
            self.confidence
        )
    }
}

/// Evaluate one pending bet against the close series at the given
/// days-ago offset. Bars between the start date and the current "now"
/// are swept oldest first; the first touch of target or stop decides
/// the bet, and a bet that survives its whole duration settles on the
/// favorable-side test at the deadline bar. Future bars beyond "now"
/// are never inspected.
pub fn evaluate(bet: &Bet, dates: &[String], prices: &[f64], days_ago: usize) -> BetOutcome {
    if !bet.is_pending() {
        return BetOutcome::Pending;
    }
    let Some(now) = now_index(prices.len(), days_ago) else {
        return BetOutcome::Pending;
    };
    let Some(start) = dates.iter().position(|d| d == &bet.start_date) else {
        return BetOutcome::Pending;
    };
    if start > now {
        return BetOutcome::Pending;
    }

    let direction = bet.direction();
    let deadline = start.saturating_add(bet.duration);
    let sweep_end = deadline.min(now + 1).min(prices.len());

    for i in (start + 1)..sweep_end {
        let price = prices[i];
        match direction {
            BetDirection::Long => {
                if price >= bet.target {
                    return won(price, format!("Long Win: {price:.2} beats target"), days_ago);
                }
                if price <= bet.stop {
                    return lost(price, "Long Loss: Stop Reached".to_string(), days_ago);
                }
            }
            BetDirection::Short => {
                if price <= bet.target {
                    return won(price, format!("Short Win: {price:.2} beats target"), days_ago);
                }
                if price >= bet.stop {
                    return lost(price, "Short Loss: Stop Reached".to_string(), days_ago);
                }
            }
        }
    }

    if now >= deadline && deadline < prices.len() {
        let price = prices[deadline];
        return match direction {
            BetDirection::Long => {
                if price >= bet.entry {
                    won(price, "Long Win: Timed Out In Profit".to_string(), days_ago)
                } else {
                    lost(price, "Long Loss: Timed Out In Loss".to_string(), days_ago)
                }
            }
            BetDirection::Short => {
                if price >= bet.entry {
                    lost(price, "Short Loss: Timed Out In Loss".to_string(), days_ago)
                } else {
                    won(price, "Short Win: Timed Out In Profit".to_string(), days_ago)
                }
            }
        };
    }

    BetOutcome::Pending
}

fn won(price: f64, message: String, days_ago: usize) -> BetOutcome {
    BetOutcome::Won(BetResolution {
        price,
        hit: TriggerHit { signal: Signal::Bull, id: EventId::BetWon, message, days_ago },
    })
}

fn lost(price: f64, message: String, days_ago: usize) -> BetOutcome {
    BetOutcome::Lost(BetResolution {
        price,
        hit: TriggerHit { signal: Signal::Bear, id: EventId::BetLost, message, days_ago },
    })
}

fn field<'a>(fields: &[&'a str], idx: usize) -> Option<&'a str> {
    fields.get(idx).copied().filter(|f| !f.is_empty())
}

fn number(raw: &str, what: &str) -> Result<f64, Report<BetError>> {
    raw.parse::<f64>().change_context(BetError::InvalidSpec {
        reason: format!("{what} \"{raw}\" is not a number"),
    })
}
