use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::model::{Signal, SignalCode};

/// Bars of forward price action kept after each recorded trigger.
pub const DEFAULT_ANALYSIS_DAYS: usize = 80;

/// Triggers younger than this have no meaningful forward window yet.
const MIN_TRIGGER_AGE_DAYS: usize = 5;

/// Forward-return tracker for trigger events found while walking the
/// backtest window. Occurrences are keyed by signal code, then symbol,
/// then predicted direction, and averaged per code and direction when
/// the run finishes.
#[derive(Debug)]
pub struct ResultLog {
    analysis_days: usize,
    codes: BTreeMap<SignalCode, BTreeMap<String, SymbolLog>>,
}

#[derive(Debug, Default)]
struct SymbolLog {
    bull: Vec<Occurrence>,
    bear: Vec<Occurrence>,
}

#[derive(Debug)]
struct Occurrence {
    start_price: f64,
    days_ago: usize,
    /// Percent gain from the trigger bar's close, index 0 = trigger bar.
    gains: Vec<f64>,
}

/// Per code and direction aggregates over every recorded occurrence.
/// `hits` is cumulative: once an occurrence reaches the trigger percent
/// in its predicted direction, it counts at that horizon and every
/// later one it has data for.
#[derive(Debug)]
pub struct CodeStats {
    pub code: SignalCode,
    pub direction: Signal,
    pub avg_gains: Vec<f64>,
    pub counts: Vec<usize>,
    pub hits: Vec<usize>,
}

/// Formatted summary rows ready for the reporting sink.
#[derive(Debug)]
pub struct ResultTables {
    pub periods: Vec<usize>,
    pub trigger_fraction: f64,
    pub average_gain: Vec<TableRow>,
    pub hit_counts: Vec<TableRow>,
}

#[derive(Debug)]
pub struct TableRow {
    pub code: SignalCode,
    pub direction: Signal,
    pub cells: Vec<String>,
}

impl ResultLog {
    pub fn new(analysis_days: usize) -> Self {
        Self { analysis_days, codes: BTreeMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Record one trigger occurrence at `days_ago` against the daily
    /// close series. Too-recent or out-of-range offsets are skipped, as
    /// is a non-positive close on the trigger bar.
    pub fn record(
        &mut self,
        code: SignalCode,
        symbol: &str,
        direction: Signal,
        days_ago: usize,
        prices: &[f64],
    ) {
        if days_ago < MIN_TRIGGER_AGE_DAYS || days_ago >= prices.len() {
            return;
        }
        let now = prices.len() - days_ago - 1;
        let start_price = prices[now];
        if start_price <= 0.0 {
            warn!(
                symbol,
                days_ago,
                index = now,
                series_len = prices.len(),
                "trigger bar close is zero or negative, dropping result entry"
            );
            return;
        }

        let keep_till = (now + self.analysis_days + 1).min(prices.len());
        let gains = prices[now..keep_till].iter().map(|p| (p - start_price) / start_price).collect();

        let log = self.codes.entry(code).or_default().entry(symbol.to_string()).or_default();
        let list = match direction {
            Signal::Bull => &mut log.bull,
            Signal::Bear => &mut log.bear,
        };
        list.push(Occurrence { start_price, days_ago, gains });
    }

    /// Fold every occurrence into per code and direction averages. Bull
    /// rows for all codes come first, then bear rows, codes in their
    /// stable sort order either way.
    pub fn aggregate(&self, trigger_fraction: f64, detail_periods: &[usize]) -> Vec<CodeStats> {
        let mut out = Vec::new();
        for direction in [Signal::Bull, Signal::Bear] {
            for (code, by_symbol) in &self.codes {
                let mut sums = vec![0.0; self.analysis_days + 1];
                let mut counts = vec![0usize; self.analysis_days + 1];
                let mut hits = vec![0usize; self.analysis_days + 1];

                for (symbol, log) in by_symbol {
                    let occurrences = match direction {
                        Signal::Bull => &log.bull,
                        Signal::Bear => &log.bear,
                    };
                    for occ in occurrences {
                        let mut has_hit = false;
                        for i in 0..=self.analysis_days {
                            if i >= occ.gains.len() {
                                break;
                            }
                            sums[i] += occ.gains[i];
                            counts[i] += 1;
                            let favorable = match direction {
                                Signal::Bull => occ.gains[i] > trigger_fraction,
                                Signal::Bear => occ.gains[i] < -trigger_fraction,
                            };
                            if favorable {
                                has_hit = true;
                            }
                            if has_hit {
                                hits[i] += 1;
                            }
                        }
                        debug!(
                            code = %code,
                            symbol,
                            direction = ?direction,
                            days_ago = occ.days_ago,
                            start_price = occ.start_price,
                            trail = occ.detail_trail(detail_periods),
                            "result entry"
                        );
                    }
                }

                let avg_gains = sums
                    .iter()
                    .zip(&counts)
                    .map(|(sum, n)| if *n > 0 { sum / *n as f64 } else { 0.0 })
                    .collect();
                out.push(CodeStats { code: *code, direction, avg_gains, counts, hits });
            }
        }
        out
    }

    /// Build the two display tables: average gain after signal, and how
    /// many occurrences hit the trigger percent by each horizon.
    pub fn tables(&self, trigger_fraction: f64, periods: &[usize]) -> ResultTables {
        let periods: Vec<usize> =
            periods.iter().copied().filter(|p| *p <= self.analysis_days).collect();
        let stats = self.aggregate(trigger_fraction, &periods);

        let mut average_gain = Vec::with_capacity(stats.len());
        let mut hit_counts = Vec::with_capacity(stats.len());
        for stat in &stats {
            let gain_cells = periods
                .iter()
                .map(|&i| format!("{:+.1} % / {}", stat.avg_gains[i] * 100.0, stat.counts[i]))
                .collect();
            let hit_cells =
                periods.iter().map(|&i| format!("{} / {}", stat.hits[i], stat.counts[i])).collect();
            average_gain.push(TableRow {
                code: stat.code,
                direction: stat.direction,
                cells: gain_cells,
            });
            hit_counts.push(TableRow { code: stat.code, direction: stat.direction, cells: hit_cells });
        }

        ResultTables { periods, trigger_fraction, average_gain, hit_counts }
    }
}

impl Occurrence {
    fn detail_trail(&self, periods: &[usize]) -> String {
        let cells: Vec<String> = periods
            .iter()
            .filter(|&&i| i < self.gains.len())
            .map(|&i| {
                format!("{:.2}({:.2})", self.start_price * (1.0 + self.gains[i]), self.gains[i])
            })
            .collect();
        cells.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_then_jump(len: usize, jump_at: usize, jump_to: f64) -> Vec<f64> {
        let mut prices = vec![100.0; len];
        for p in prices.iter_mut().skip(jump_at) {
            *p = jump_to;
        }
        prices
    }

    #[test]
    fn single_occurrence_average_is_its_own_gain() {
        // Trigger 10 days back in a 25 bar series, +5% five bars later.
        let mut prices = vec![100.0; 25];
        prices[19] = 105.0;
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 10, &prices);

        let stats = log.aggregate(0.1, &[]);
        let bull = &stats[0];
        assert_eq!(bull.code, SignalCode::Rsi);
        assert_eq!(bull.direction, Signal::Bull);
        assert_eq!(bull.avg_gains[5], 0.05);
        assert_eq!(bull.counts[5], 1);
        // Only ten forward bars exist, so later horizons run dry.
        assert_eq!(bull.counts[10], 1);
        assert_eq!(bull.counts[11], 0);
    }

    #[test]
    fn too_recent_or_out_of_range_triggers_are_dropped() {
        let prices = vec![100.0; 25];
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 4, &prices);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 25, &prices);
        assert!(log.is_empty());
    }

    #[test]
    fn zero_start_price_is_dropped() {
        let mut prices = vec![100.0; 25];
        prices[14] = 0.0;
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 10, &prices);
        assert!(log.is_empty());
    }

    #[test]
    fn hit_counts_are_sticky_across_horizons() {
        // +12% on the first forward bar, back to flat afterwards: the
        // occurrence keeps counting as a hit at every later horizon.
        let mut prices = vec![100.0; 30];
        prices[20] = 112.0;
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Seq, "ACME", Signal::Bull, 10, &prices);

        let stats = log.aggregate(0.1, &[]);
        let bull = &stats[0];
        assert_eq!(bull.hits[0], 0);
        assert_eq!(bull.hits[1], 1);
        assert_eq!(bull.hits[5], 1);
        assert_eq!(bull.hits[10], 1);
    }

    #[test]
    fn bear_predictions_hit_on_drops() {
        let prices = flat_then_jump(30, 20, 80.0);
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Rsi, "ACME", Signal::Bear, 10, &prices);

        let stats = log.aggregate(0.1, &[]);
        let bear = stats.iter().find(|s| s.direction == Signal::Bear).unwrap();
        assert_eq!(bear.hits[0], 0);
        assert_eq!(bear.hits[1], 1);
        // The same code's bull row exists with zero occurrences.
        let bull = stats.iter().find(|s| s.direction == Signal::Bull).unwrap();
        assert_eq!(bull.counts[1], 0);
    }

    #[test]
    fn averages_pool_across_symbols() {
        let mut up = vec![100.0; 30];
        up[20] = 110.0;
        let mut down = vec![100.0; 30];
        down[20] = 90.0;
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 10, &up);
        log.record(SignalCode::Rsi, "ZETA", Signal::Bull, 10, &down);

        let stats = log.aggregate(0.1, &[]);
        let bull = &stats[0];
        assert_eq!(bull.counts[1], 2);
        assert!(bull.avg_gains[1].abs() < 1e-12);
    }

    #[test]
    fn tables_format_percent_and_counts() {
        let mut prices = vec![100.0; 25];
        prices[19] = 105.0;
        let mut log = ResultLog::new(DEFAULT_ANALYSIS_DAYS);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 10, &prices);

        let tables = log.tables(0.1, &[1, 5, 10, 15, 20, 25]);
        assert_eq!(tables.periods, vec![1, 5, 10, 15, 20, 25]);
        let bull_row = &tables.average_gain[0];
        assert_eq!(bull_row.code, SignalCode::Rsi);
        assert_eq!(bull_row.cells[1], "+5.0 % / 1");
        assert_eq!(bull_row.cells[5], "+0.0 % / 0");
        let hit_row = &tables.hit_counts[0];
        assert_eq!(hit_row.cells[0], "0 / 1");
    }

    #[test]
    fn periods_past_the_analysis_window_are_dropped() {
        let mut prices = vec![100.0; 40];
        prices[25] = 105.0;
        let mut log = ResultLog::new(10);
        log.record(SignalCode::Rsi, "ACME", Signal::Bull, 10, &prices);
        let tables = log.tables(0.1, &[5, 10, 15]);
        assert_eq!(tables.periods, vec![5, 10]);
    }
}
