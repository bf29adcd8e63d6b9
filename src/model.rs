use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Date key used for a day the instrument did not trade. Included in the
/// daily series positionally but skipped by week-boundary detection.
pub const NO_TRADE_KEY: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Date-keyed bar history for one instrument. ISO date keys sort
/// lexicographically in chronological order, so the map iterates oldest
/// to newest.
pub type PriceHistory = BTreeMap<String, PriceBar>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Binance,
    Bitfinex,
    Stooq,
}

impl FeedKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "binance" => Some(Self::Binance),
            "bitfinex" => Some(Self::Bitfinex),
            "stooq" => Some(Self::Stooq),
            _ => None,
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binance => write!(f, "binance"),
            Self::Bitfinex => write!(f, "bitfinex"),
            Self::Stooq => write!(f, "stooq"),
        }
    }
}

/// Direction of a trigger event. Bull scores +1, bear scores -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Bull,
    Bear,
}

impl Signal {
    pub fn magnitude(self) -> i64 {
        match self {
            Self::Bull => 1,
            Self::Bear => -1,
        }
    }

    /// Leading marker on alert lines.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Bull => "+",
            Self::Bear => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    Daily,
    Weekly,
}

impl Scale {
    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }

    /// Short tag used in sequential messages.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Daily => "d",
            Self::Weekly => "w",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AverageKind {
    Simple,
    Exponential,
}

impl AverageKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Simple => "MA",
            Self::Exponential => "EMA",
        }
    }
}

/// The configurable check vocabulary. Config and `--checks` use the
/// string codes; the four cross checks per average kind enable that
/// window for pairwise crossover scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Rsi,
    RsiWeekly,
    MaCross1,
    MaCross2,
    MaCross3,
    MaCross4,
    EmaCross1,
    EmaCross2,
    EmaCross3,
    EmaCross4,
    MaSort,
    EmaSort,
    Seq,
    SeqWeekly,
    Multi,
    Bets,
    Control,
}

impl CheckKind {
    pub const ALL: [CheckKind; 17] = [
        Self::Rsi,
        Self::RsiWeekly,
        Self::EmaCross1,
        Self::EmaCross2,
        Self::EmaCross3,
        Self::EmaCross4,
        Self::MaCross1,
        Self::MaCross2,
        Self::MaCross3,
        Self::MaCross4,
        Self::MaSort,
        Self::EmaSort,
        Self::Seq,
        Self::SeqWeekly,
        Self::Multi,
        Self::Bets,
        Self::Control,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rsi" => Some(Self::Rsi),
            "rsi_w" => Some(Self::RsiWeekly),
            "max1" => Some(Self::MaCross1),
            "max2" => Some(Self::MaCross2),
            "max3" => Some(Self::MaCross3),
            "max4" => Some(Self::MaCross4),
            "emax1" => Some(Self::EmaCross1),
            "emax2" => Some(Self::EmaCross2),
            "emax3" => Some(Self::EmaCross3),
            "emax4" => Some(Self::EmaCross4),
            "masort" => Some(Self::MaSort),
            "emasort" => Some(Self::EmaSort),
            "seq" => Some(Self::Seq),
            "seq_w" => Some(Self::SeqWeekly),
            "multi" => Some(Self::Multi),
            "bets" => Some(Self::Bets),
            "ctrl" => Some(Self::Control),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rsi => "rsi",
            Self::RsiWeekly => "rsi_w",
            Self::MaCross1 => "max1",
            Self::MaCross2 => "max2",
            Self::MaCross3 => "max3",
            Self::MaCross4 => "max4",
            Self::EmaCross1 => "emax1",
            Self::EmaCross2 => "emax2",
            Self::EmaCross3 => "emax3",
            Self::EmaCross4 => "emax4",
            Self::MaSort => "masort",
            Self::EmaSort => "emasort",
            Self::Seq => "seq",
            Self::SeqWeekly => "seq_w",
            Self::Multi => "multi",
            Self::Bets => "bets",
            Self::Control => "ctrl",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Rsi => "Daily RSI crossing out of oversold (bull) or overbought (bear)",
            Self::RsiWeekly => "RSI check on the weekly series",
            Self::MaCross1 => "MA crossovers, include fastest MA (25 day by default)",
            Self::MaCross2 => "MA crossovers, include 2nd fastest MA (50 day by default)",
            Self::MaCross3 => "MA crossovers, include 2nd slowest MA (100 day by default)",
            Self::MaCross4 => "MA crossovers, include slowest MA (200 day by default)",
            Self::EmaCross1 => "EMA crossovers, include fastest EMA (20 day by default)",
            Self::EmaCross2 => "EMA crossovers, include 2nd fastest EMA (50 day by default)",
            Self::EmaCross3 => "EMA crossovers, include 2nd slowest EMA (100 day by default)",
            Self::EmaCross4 => "EMA crossovers, include slowest EMA (200 day by default)",
            Self::MaSort => "All four MAs sorted fastest to slowest, signaling a strong trend",
            Self::EmaSort => "All four EMAs sorted fastest to slowest",
            Self::Seq => "Streak count of closes above the close four days back, contrarian at 9",
            Self::SeqWeekly => "Sequential streak count on weekly closes",
            Self::Multi => "Any single day that trips more than one other signal",
            Self::Bets => "Conditional bets resolving against price action",
            Self::Control => "Random buy/sell signals, a control group against dumb luck",
        }
    }

    /// Checks enabled when neither config nor CLI names any.
    pub fn default_set() -> Vec<CheckKind> {
        vec![
            Self::Rsi,
            Self::RsiWeekly,
            Self::Seq,
            Self::SeqWeekly,
            Self::EmaCross1,
            Self::EmaCross4,
            Self::EmaSort,
            Self::Multi,
            Self::Bets,
        ]
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dedup key for one conceptual trigger occurrence on one instrument.
/// Weekly checks carry the week index they examined, so overlapping
/// backtest days that see the same week collapse to one occurrence.
/// Bet and control events carry no offset and fire at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    RsiCross { scale: Scale, bull: bool, offset: usize },
    AvgCross { kind: AverageKind, fast: u32, slow: u32, offset: usize },
    SortFlip { kind: AverageKind, offset: usize },
    SeqNine { scale: Scale, bull: bool, offset: usize },
    BetWon,
    BetLost,
    ControlBull,
    ControlBear,
}

/// A detected trigger event, before dedup and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerHit {
    pub signal: Signal,
    pub id: EventId,
    pub message: String,
    /// Display offset in daily bars, even for weekly-scale events.
    pub days_ago: usize,
}

/// Key naming a check family in backtest aggregate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalCode {
    Rsi,
    RsiWeekly,
    MaCross(u8),
    EmaCross(u8),
    MaSort,
    EmaSort,
    Seq,
    SeqWeekly,
    Multi,
    BetWon,
    BetLost,
    Control,
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsi => write!(f, "rsi"),
            Self::RsiWeekly => write!(f, "rsi_w"),
            Self::MaCross(pair) => write!(f, "max{pair}"),
            Self::EmaCross(pair) => write!(f, "emax{pair}"),
            Self::MaSort => write!(f, "masort"),
            Self::EmaSort => write!(f, "emasort"),
            Self::Seq => write!(f, "seq"),
            Self::SeqWeekly => write!(f, "seq_w"),
            Self::Multi => write!(f, "multi"),
            Self::BetWon => write!(f, "bet_w"),
            Self::BetLost => write!(f, "bet_l"),
            Self::Control => write!(f, "ctrl"),
        }
    }
}

/// One row of the per-instrument run summary.
#[derive(Debug, Clone)]
pub struct InstrumentSummary {
    pub symbol: String,
    pub last_price: f64,
    pub score: i64,
    pub best_day_score: i64,
    pub best_day: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_kind_round_trip() {
        for kind in CheckKind::ALL {
            assert_eq!(CheckKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn check_kind_invalid_string_returns_none() {
        assert_eq!(CheckKind::from_str("macd"), None);
        assert_eq!(CheckKind::from_str(""), None);
    }

    #[test]
    fn default_set_is_subset_of_vocabulary() {
        let defaults = CheckKind::default_set();
        assert!(defaults.contains(&CheckKind::Rsi));
        assert!(defaults.contains(&CheckKind::Bets));
        assert!(!defaults.contains(&CheckKind::Control));
        for kind in &defaults {
            assert!(CheckKind::ALL.contains(kind));
        }
    }

    #[test]
    fn signal_magnitude_and_prefix() {
        assert_eq!(Signal::Bull.magnitude(), 1);
        assert_eq!(Signal::Bear.magnitude(), -1);
        assert_eq!(Signal::Bull.prefix(), "+");
        assert_eq!(Signal::Bear.prefix(), "-");
    }

    #[test]
    fn signal_code_display() {
        assert_eq!(SignalCode::MaCross(12).to_string(), "max12");
        assert_eq!(SignalCode::EmaCross(34).to_string(), "emax34");
        assert_eq!(SignalCode::BetWon.to_string(), "bet_w");
        assert_eq!(SignalCode::RsiWeekly.to_string(), "rsi_w");
    }

    #[test]
    fn event_ids_distinguish_scale_and_direction() {
        let daily = EventId::RsiCross { scale: Scale::Daily, bull: true, offset: 3 };
        let weekly = EventId::RsiCross { scale: Scale::Weekly, bull: true, offset: 3 };
        let bear = EventId::RsiCross { scale: Scale::Daily, bull: false, offset: 3 };
        assert_ne!(daily, weekly);
        assert_ne!(daily, bear);
    }

    #[test]
    fn price_bar_serde_round_trip() {
        let bar = PriceBar { open: 1.0, high: 2.0, low: 0.5, close: 1.5, volume: 100.0 };
        let json = serde_json::to_string(&bar).unwrap();
        let parsed: PriceBar = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bar);
    }
}
