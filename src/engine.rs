use std::collections::{HashMap, HashSet};

use rand::Rng;
use tracing::debug;

use crate::backtest::ResultLog;
use crate::bet::{self, Bet, BetOutcome, BetState};
use crate::indicator::{ma, rsi, sequential};
use crate::ledger::Ledger;
use crate::model::{
    AverageKind, CheckKind, InstrumentSummary, PriceHistory, Scale, Signal, SignalCode, TriggerHit,
};
use crate::series::{self, PriceSeries};
use crate::trigger::{control, cross, momentum};

pub const DEFAULT_EMA_WINDOWS: [usize; 4] = [20, 50, 100, 200];
pub const DEFAULT_MA_WINDOWS: [usize; 4] = [25, 50, 100, 200];

const RSI_PERIOD: usize = 14;
const SEQUENTIAL_LOOKBACK: usize = 4;

/// Window pairs scanned for crossovers, indices into the four averages
/// ordered short to long.
const CROSS_PAIRS: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
const MA_CHECKS: [CheckKind; 4] =
    [CheckKind::MaCross1, CheckKind::MaCross2, CheckKind::MaCross3, CheckKind::MaCross4];
const EMA_CHECKS: [CheckKind; 4] =
    [CheckKind::EmaCross1, CheckKind::EmaCross2, CheckKind::EmaCross3, CheckKind::EmaCross4];
const SPAN_NAMES: [&str; 4] = ["Short", "Med", "Long", "VLong"];

/// Scan tunables resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub checks: HashSet<CheckKind>,
    /// Oldest days-ago offset to scan; 0 scans only the latest bar.
    pub backtest_days: usize,
    /// Absolute per-day score that trips the multi check.
    pub multi_threshold: i64,
    pub analysis_days: usize,
    /// Per-symbol window overrides: four EMA windows, optionally
    /// followed by four MA windows.
    pub window_overrides: HashMap<String, Vec<usize>>,
}

/// One linear pass over instruments and backtest days. The engine owns
/// the run's ledger, result log and bet book; `finish` hands them back
/// once every instrument has been scanned.
pub struct Engine<R: Rng> {
    settings: EngineSettings,
    ledger: Ledger,
    results: ResultLog,
    bets: Vec<Bet>,
    summaries: Vec<InstrumentSummary>,
    rng: R,
}

pub struct EngineOutput {
    pub ledger: Ledger,
    pub results: ResultLog,
    pub bets: Vec<Bet>,
    pub summaries: Vec<InstrumentSummary>,
}

struct Indicators {
    rsi_daily: Vec<f64>,
    rsi_weekly: Vec<f64>,
    seq_daily: Vec<i32>,
    seq_weekly: Vec<i32>,
    ma: [Vec<f64>; 4],
    ema: [Vec<f64>; 4],
    ma_windows: [usize; 4],
    ema_windows: [usize; 4],
}

impl Indicators {
    fn compute(series: &PriceSeries, ema_windows: [usize; 4], ma_windows: [usize; 4]) -> Self {
        Self {
            rsi_daily: rsi::rsi(&series.daily, RSI_PERIOD),
            rsi_weekly: rsi::rsi(&series.weekly, RSI_PERIOD),
            seq_daily: sequential::sequential(&series.daily, SEQUENTIAL_LOOKBACK),
            seq_weekly: sequential::sequential(&series.weekly, SEQUENTIAL_LOOKBACK),
            ma: ma_windows.map(|w| ma::sma(&series.daily, w)),
            ema: ema_windows.map(|w| ma::ema(&series.daily, w)),
            ma_windows,
            ema_windows,
        }
    }

    fn averages(&self, kind: AverageKind) -> &[Vec<f64>; 4] {
        match kind {
            AverageKind::Simple => &self.ma,
            AverageKind::Exponential => &self.ema,
        }
    }

    fn windows(&self, kind: AverageKind) -> &[usize; 4] {
        match kind {
            AverageKind::Simple => &self.ma_windows,
            AverageKind::Exponential => &self.ema_windows,
        }
    }
}

impl<R: Rng> Engine<R> {
    pub fn new(settings: EngineSettings, bets: Vec<Bet>, rng: R) -> Self {
        let results = ResultLog::new(settings.analysis_days);
        Self { settings, ledger: Ledger::new(), results, bets, summaries: Vec::new(), rng }
    }

    /// Scan one instrument over the configured backtest window. Fewer
    /// than three usable bars skips the instrument entirely; it gets no
    /// summary row and no events.
    pub fn scan_instrument(&mut self, symbol: &str, history: &PriceHistory) {
        let series = series::build(history);
        if series.daily.len() <= 2 {
            debug!(symbol, bars = series.daily.len(), "not enough bars, skipping");
            return;
        }

        let (ema_windows, ma_windows) = self.windows_for(symbol);
        let ind = Indicators::compute(&series, ema_windows, ma_windows);

        let mut score = 0i64;
        let mut best_day_score = 0i64;
        let mut best_day = 0usize;

        for d in (0..=self.settings.backtest_days).rev() {
            let day_score = self.scan_day(symbol, &series, &ind, d);
            score += day_score;
            if day_score.abs() > best_day_score.abs() {
                best_day_score = day_score;
                best_day = d;
            }
            debug!(symbol, days_ago = d, day_score, "day scanned");
        }

        self.summaries.push(InstrumentSummary {
            symbol: symbol.to_string(),
            last_price: series.daily.last().copied().unwrap_or_default(),
            score,
            best_day_score,
            best_day,
        });
    }

    /// Run every enabled check for one days-ago offset. The returned
    /// day score sums fresh scanning events only; bet resolutions and
    /// control noise go through the ledger but never into scores.
    fn scan_day(&mut self, symbol: &str, series: &PriceSeries, ind: &Indicators, d: usize) -> i64 {
        let mut day_score = 0i64;
        let week = series.week_index(d);

        if !series.daily.is_empty() {
            if self.enabled(CheckKind::Rsi) {
                let hit = momentum::rsi_cross(&ind.rsi_daily, d, Scale::Daily, d);
                day_score += self.score_hit(symbol, SignalCode::Rsi, hit, d, series);
            }

            for kind in [AverageKind::Simple, AverageKind::Exponential] {
                for (a, b) in CROSS_PAIRS {
                    if !self.cross_pair_enabled(kind, a, b) {
                        continue;
                    }
                    let avgs = ind.averages(kind);
                    let windows = ind.windows(kind);
                    let hit = cross::avg_cross(
                        &avgs[a],
                        &avgs[b],
                        d,
                        kind,
                        windows[a] as u32,
                        windows[b] as u32,
                        &cross_label(kind, windows, a, b),
                    );
                    day_score += self.score_hit(symbol, pair_code(kind, a, b), hit, d, series);
                }
            }

            if self.enabled(CheckKind::Seq) {
                let hit = momentum::sequential_nine(&ind.seq_daily, d, Scale::Daily, d);
                day_score += self.score_hit(symbol, SignalCode::Seq, hit, d, series);
            }
            if self.enabled(CheckKind::MaSort) {
                let hit = cross::sort_flip(slices(&ind.ma), d, AverageKind::Simple);
                day_score += self.score_hit(symbol, SignalCode::MaSort, hit, d, series);
            }
            if self.enabled(CheckKind::EmaSort) {
                let hit = cross::sort_flip(slices(&ind.ema), d, AverageKind::Exponential);
                day_score += self.score_hit(symbol, SignalCode::EmaSort, hit, d, series);
            }
        }

        if !series.weekly.is_empty() {
            if self.enabled(CheckKind::RsiWeekly) {
                let hit = momentum::rsi_cross(&ind.rsi_weekly, week, Scale::Weekly, d);
                day_score += self.score_hit(symbol, SignalCode::RsiWeekly, hit, d, series);
            }
            if self.enabled(CheckKind::SeqWeekly) {
                let hit = momentum::sequential_nine(&ind.seq_weekly, week, Scale::Weekly, d);
                day_score += self.score_hit(symbol, SignalCode::SeqWeekly, hit, d, series);
            }
        }

        if self.enabled(CheckKind::Multi) {
            if day_score >= self.settings.multi_threshold {
                self.results.record(SignalCode::Multi, symbol, Signal::Bull, d, &series.daily);
            }
            if day_score <= -self.settings.multi_threshold {
                self.results.record(SignalCode::Multi, symbol, Signal::Bear, d, &series.daily);
            }
        }

        if self.enabled(CheckKind::Bets) {
            self.check_bets(symbol, series, d);
        }

        if self.enabled(CheckKind::Control) {
            if let Some(hit) = control::control(&mut self.rng, d) {
                if self.ledger.record(symbol, &hit) {
                    self.results.record(SignalCode::Control, symbol, hit.signal, d, &series.daily);
                }
            }
        }

        day_score
    }

    /// Route one potential hit through dedup, scoring and the result
    /// log. Returns the score contribution: the signal magnitude for a
    /// fresh event, zero for misses and repeats.
    fn score_hit(
        &mut self,
        symbol: &str,
        code: SignalCode,
        hit: Option<TriggerHit>,
        d: usize,
        series: &PriceSeries,
    ) -> i64 {
        let Some(hit) = hit else {
            return 0;
        };
        if !self.ledger.record(symbol, &hit) {
            return 0;
        }
        self.results.record(code, symbol, hit.signal, d, &series.daily);
        hit.signal.magnitude()
    }

    fn check_bets(&mut self, symbol: &str, series: &PriceSeries, d: usize) {
        for idx in 0..self.bets.len() {
            if self.bets[idx].symbol != symbol || !self.bets[idx].is_pending() {
                continue;
            }
            let (state, resolution) =
                match bet::evaluate(&self.bets[idx], &series.dates, &series.daily, d) {
                    BetOutcome::Pending => continue,
                    BetOutcome::Won(res) => (BetState::Won, res),
                    BetOutcome::Lost(res) => (BetState::Lost, res),
                };
            self.bets[idx].settle(state, resolution.price);
            self.ledger.record(symbol, &resolution.hit);
            let code = match state {
                BetState::Won => SignalCode::BetWon,
                _ => SignalCode::BetLost,
            };
            self.results.record(code, symbol, resolution.hit.signal, d, &series.daily);
        }
    }

    fn cross_pair_enabled(&self, kind: AverageKind, a: usize, b: usize) -> bool {
        let checks = match kind {
            AverageKind::Simple => &MA_CHECKS,
            AverageKind::Exponential => &EMA_CHECKS,
        };
        self.enabled(checks[a]) && self.enabled(checks[b])
    }

    fn enabled(&self, check: CheckKind) -> bool {
        self.settings.checks.contains(&check)
    }

    fn windows_for(&self, symbol: &str) -> ([usize; 4], [usize; 4]) {
        let mut ema = DEFAULT_EMA_WINDOWS;
        let mut ma = DEFAULT_MA_WINDOWS;
        if let Some(values) = self.settings.window_overrides.get(symbol) {
            for (i, value) in values.iter().take(8).enumerate() {
                if i < 4 {
                    ema[i] = *value;
                } else {
                    ma[i - 4] = *value;
                }
            }
        }
        (ema, ma)
    }

    pub fn finish(self) -> EngineOutput {
        EngineOutput {
            ledger: self.ledger,
            results: self.results,
            bets: self.bets,
            summaries: self.summaries,
        }
    }
}

fn slices(avgs: &[Vec<f64>; 4]) -> [&[f64]; 4] {
    [avgs[0].as_slice(), avgs[1].as_slice(), avgs[2].as_slice(), avgs[3].as_slice()]
}

fn pair_code(kind: AverageKind, a: usize, b: usize) -> SignalCode {
    let pair = ((a + 1) * 10 + b + 1) as u8;
    match kind {
        AverageKind::Simple => SignalCode::MaCross(pair),
        AverageKind::Exponential => SignalCode::EmaCross(pair),
    }
}

fn cross_label(kind: AverageKind, windows: &[usize; 4], a: usize, b: usize) -> String {
    let prefix = match kind {
        AverageKind::Simple => "",
        AverageKind::Exponential => "Exp-",
    };
    format!("{prefix}{} {} vs {} {}", SPAN_NAMES[a], windows[a], SPAN_NAMES[b], windows[b])
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::model::{EventId, PriceBar};

    fn weekday_history(closes: &[f64]) -> PriceHistory {
        let mut history = PriceHistory::new();
        let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut added = 0;
        while added < closes.len() {
            if date.weekday().number_from_monday() <= 5 {
                let close = closes[added];
                history.insert(
                    date.format("%Y-%m-%d").to_string(),
                    PriceBar { open: close, high: close, low: close, close, volume: 0.0 },
                );
                added += 1;
            }
            date = date.succ_opt().unwrap();
        }
        history
    }

    fn settings(checks: &[CheckKind], backtest_days: usize) -> EngineSettings {
        EngineSettings {
            checks: checks.iter().copied().collect(),
            backtest_days,
            multi_threshold: 2,
            analysis_days: 80,
            window_overrides: HashMap::new(),
        }
    }

    fn engine(settings: EngineSettings) -> Engine<StdRng> {
        Engine::new(settings, Vec::new(), StdRng::seed_from_u64(1))
    }

    #[test]
    fn instruments_with_too_few_bars_are_skipped() {
        let mut eng = engine(settings(&CheckKind::default_set(), 5));
        eng.scan_instrument("ACME", &weekday_history(&[10.0, 11.0]));
        let output = eng.finish();
        assert!(output.summaries.is_empty());
        assert!(output.ledger.alerts().is_empty());
    }

    #[test]
    fn daily_streaks_score_and_feed_multi() {
        // 30 descending closes: the four-back streak counter reads -9
        // at indices 12 and 21, which are offsets 17 and 8.
        let closes: Vec<f64> = (0..30).map(|i| 1000.0 - i as f64).collect();
        let mut cfg = settings(&[CheckKind::Seq, CheckKind::Multi], 20);
        cfg.multi_threshold = 1;
        let mut eng = engine(cfg);
        eng.scan_instrument("ACME", &weekday_history(&closes));
        let output = eng.finish();

        assert_eq!(output.ledger.alerts().len(), 2);
        let summary = &output.summaries[0];
        assert_eq!(summary.score, 2);
        assert_eq!(summary.best_day_score, 1);
        assert_eq!(summary.best_day, 17);
        assert_eq!(summary.last_price, 971.0);

        let stats = output.results.aggregate(0.1, &[]);
        let seq_bull = stats
            .iter()
            .find(|s| s.code == SignalCode::Seq && s.direction == Signal::Bull)
            .unwrap();
        assert_eq!(seq_bull.counts[0], 2);
        let multi_bull = stats
            .iter()
            .find(|s| s.code == SignalCode::Multi && s.direction == Signal::Bull)
            .unwrap();
        assert_eq!(multi_bull.counts[0], 2);
    }

    #[test]
    fn weekly_events_collapse_across_overlapping_days() {
        // Fourteen descending Mon-Fri weeks: the weekly streak counter
        // reads -9 one week back, which days one through five all see.
        let closes: Vec<f64> = (0..70).map(|i| 1000.0 - i as f64).collect();
        let mut eng = engine(settings(&[CheckKind::SeqWeekly], 6));
        eng.scan_instrument("ACME", &weekday_history(&closes));
        let output = eng.finish();

        assert_eq!(output.ledger.alerts().len(), 1);
        let id = EventId::SeqNine { scale: Scale::Weekly, bull: true, offset: 1 };
        assert_eq!(output.ledger.repeat_count("ACME", id), 5);

        let summary = &output.summaries[0];
        assert_eq!(summary.score, 1);
        assert_eq!(summary.best_day_score, 1);
        assert_eq!(summary.best_day, 5);
    }

    #[test]
    fn bet_resolutions_mark_the_book_but_not_the_score() {
        let mut closes = vec![100.0; 30];
        closes[20] = 111.0;
        let history = weekday_history(&closes);
        let dates: Vec<String> = history.keys().cloned().collect();

        let bet = Bet {
            symbol: "ACME".into(),
            start_date: dates[15].clone(),
            entry: 100.0,
            target: 110.0,
            stop: 95.0,
            duration: 20,
            confidence: 33.0,
            state: BetState::Pending,
            resolution_price: None,
            comment: None,
        };
        let mut eng =
            Engine::new(settings(&[CheckKind::Bets], 15), vec![bet], StdRng::seed_from_u64(1));
        eng.scan_instrument("ACME", &history);
        let output = eng.finish();

        assert_eq!(output.bets[0].state, BetState::Won);
        assert_eq!(output.bets[0].resolution_price, Some(111.0));
        assert_eq!(output.ledger.alerts().len(), 1);
        assert!(output.ledger.alerts()[0].contains("Long Win: 111.00 beats target"));
        assert_eq!(output.ledger.entry("ACME").unwrap().score, 1);
        // The run summary score tracks scanning checks only.
        assert_eq!(output.summaries[0].score, 0);
    }

    #[test]
    fn control_noise_stays_out_of_scores_and_dedups() {
        let closes = vec![100.0; 10];
        let mut eng = engine(settings(&[CheckKind::Control], 400));
        eng.scan_instrument("ACME", &weekday_history(&closes));
        let output = eng.finish();

        // At most one bull and one bear line per instrument per run.
        assert!(output.ledger.alerts().len() <= 2);
        assert_eq!(output.summaries[0].score, 0);
        assert_eq!(output.summaries[0].best_day_score, 0);
    }

    #[test]
    fn window_overrides_reach_labels_and_checks() {
        // Tiny SMA windows make the final bar a clean golden cross.
        let mut closes = vec![10.0; 10];
        closes[9] = 20.0;
        let mut cfg = settings(&[CheckKind::MaCross1, CheckKind::MaCross2], 0);
        cfg.window_overrides.insert("ACME".into(), vec![20, 50, 100, 200, 1, 2, 3, 4]);
        let mut eng = engine(cfg);
        eng.scan_instrument("ACME", &weekday_history(&closes));
        let output = eng.finish();

        let alerts = output.ledger.alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("GCross Short 1 vs Med 2"), "got: {}", alerts[0]);
        assert_eq!(output.summaries[0].score, 1);
    }

    #[test]
    fn finish_hands_back_everything() {
        let closes: Vec<f64> = (0..30).map(|i| 1000.0 - i as f64).collect();
        let mut eng = engine(settings(&[CheckKind::Seq], 20));
        eng.scan_instrument("ACME", &weekday_history(&closes));
        let output = eng.finish();
        assert_eq!(output.summaries.len(), 1);
        assert_eq!(output.ledger.alerts().len(), 2);
        assert!(output.bets.is_empty());
    }
}
