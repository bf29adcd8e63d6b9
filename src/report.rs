use chrono::NaiveDate;

use crate::backtest::ResultLog;
use crate::ledger::Ledger;
use crate::model::{CheckKind, InstrumentSummary, Signal};

/// Longest reason trail shown per summary line.
const REASON_CLIP: usize = 120;

/// Per-instrument run summary, one row per scanned instrument.
pub fn summary_table(summaries: &[InstrumentSummary]) -> String {
    let headers =
        ["Ticker", "Price", "Indic Sum", "Best score", "On day"].map(str::to_string).to_vec();
    let rows = summaries
        .iter()
        .map(|s| {
            vec![
                s.symbol.clone(),
                format!("{:.2}", s.last_price),
                s.score.to_string(),
                s.best_day_score.to_string(),
                s.best_day.to_string(),
            ]
        })
        .collect();
    render_table(&headers, rows)
}

/// The daily summary body: date line, then scoring instruments best
/// first, then the negative scorers. `min_score` drops the noise when
/// many instruments trigger single checks.
pub fn daily_summary(ledger: &Ledger, min_score: i64, today: NaiveDate) -> String {
    let mut body = format!("{today}\n\nNice looking things this time:\n");
    for (symbol, score, reason) in ranked(ledger.tops()) {
        if score > 0 && score >= min_score {
            body.push_str(&format!("{score}:\t{symbol}\t{}\n", clip(reason, REASON_CLIP)));
        }
    }

    body.push_str("\n\nAnd some things looking bad:\n");
    for (symbol, score, reason) in ranked(ledger.bottoms()) {
        if score < 0 && score <= -min_score {
            body.push_str(&format!("{score}:\t{symbol}\t{}\n", clip(reason, REASON_CLIP)));
        }
    }
    body
}

/// Wrap a summary body in mail headers, ready to pipe to a sendmail.
pub fn email_text(from: &str, to: &[String], body: &str) -> String {
    format!("From: {from}\nTo: {}\nSubject: Daily Stock Summary\n\n{body}", to.join(", "))
}

/// Render both backtest aggregate tables, or None when no occurrence
/// was recorded.
pub fn backtest_report(log: &ResultLog, trigger_fraction: f64, periods: &[usize]) -> Option<String> {
    if log.is_empty() {
        return None;
    }
    let tables = log.tables(trigger_fraction, periods);

    let mut headers = vec!["Signal".to_string(), "Direction".to_string()];
    headers.extend(tables.periods.iter().map(|i| format!("{i} Bar")));

    let average_gain = tables
        .average_gain
        .iter()
        .map(|row| {
            let mut cells = vec![row.code.to_string(), direction_label(row.direction).to_string()];
            cells.extend(row.cells.iter().cloned());
            cells
        })
        .collect();
    let hit_counts = tables
        .hit_counts
        .iter()
        .map(|row| {
            let mut cells = vec![row.code.to_string(), direction_label(row.direction).to_string()];
            cells.extend(row.cells.iter().cloned());
            cells
        })
        .collect();

    Some(format!(
        "\nAverage Gain After Signal:\n{}\n\nNumber that Hit +/-{:.1}% gain/loss in bull/bear by:\n{}",
        render_table(&headers, average_gain),
        tables.trigger_fraction * 100.0,
        render_table(&headers, hit_counts),
    ))
}

/// The check vocabulary with descriptions, enabled ones marked.
pub fn check_listing(enabled: &[CheckKind]) -> String {
    let mut kinds = CheckKind::ALL;
    kinds.sort_by_key(|k| k.as_str());
    let mut out = String::new();
    for kind in kinds {
        let marker = if enabled.contains(&kind) { " [enabled]" } else { "" };
        out.push_str(&format!("{}\t{}{}\n", kind.as_str(), kind.describe(), marker));
    }
    out
}

fn direction_label(signal: Signal) -> &'static str {
    match signal {
        Signal::Bull => "Bull",
        Signal::Bear => "Bear",
    }
}

fn ranked<'a>(mut entries: Vec<(&'a str, i64, &'a str)>) -> Vec<(&'a str, i64, &'a str)> {
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    entries
}

fn clip(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Plain column-aligned table: headers, a dashed rule per column, rows.
fn render_table(headers: &[String], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    push_row(&mut out, headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        if i + 1 < cells.len() {
            out.push_str(&format!("{cell:<width$}", width = widths[i]));
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventId, Scale, SignalCode, TriggerHit};

    fn hit(signal: Signal, offset: usize, message: &str) -> TriggerHit {
        TriggerHit {
            signal,
            id: EventId::RsiCross { scale: Scale::Daily, bull: signal == Signal::Bull, offset },
            message: message.to_string(),
            days_ago: offset,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn summary_table_aligns_columns() {
        let table = summary_table(&[
            InstrumentSummary {
                symbol: "TSCO".into(),
                last_price: 281.5,
                score: 3,
                best_day_score: 2,
                best_day: 4,
            },
            InstrumentSummary {
                symbol: "BP".into(),
                last_price: 4.75,
                score: -1,
                best_day_score: -1,
                best_day: 0,
            },
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Ticker  Price   Indic Sum  Best score  On day");
        assert_eq!(lines[1], "------  ------  ---------  ----------  ------");
        assert_eq!(lines[2], "TSCO    281.50  3          2           4");
        assert_eq!(lines[3], "BP      4.75    -1         -1          0");
    }

    #[test]
    fn daily_summary_splits_and_ranks_by_score() {
        let mut ledger = Ledger::new();
        ledger.record("AAA", &hit(Signal::Bull, 0, "RSI Daily up"));
        ledger.record("BBB", &hit(Signal::Bull, 0, "RSI Daily up"));
        ledger.record("BBB", &hit(Signal::Bull, 1, "GCross Short 20 vs Med 50"));
        ledger.record("CCC", &hit(Signal::Bear, 0, "RSI Daily falling"));

        let body = daily_summary(&ledger, 0, day());
        let bulls = body.find("Nice looking things this time:").unwrap();
        let bears = body.find("And some things looking bad:").unwrap();
        assert!(body.starts_with("2024-03-01\n"));
        assert!(bulls < bears);
        // Two-trigger BBB outranks AAA.
        assert!(body.find("2:\tBBB").unwrap() < body.find("1:\tAAA").unwrap());
        assert!(body.contains("-1:\tCCC\tRSI Daily falling"));
    }

    #[test]
    fn daily_summary_min_score_filters_single_triggers() {
        let mut ledger = Ledger::new();
        ledger.record("AAA", &hit(Signal::Bull, 0, "RSI Daily up"));
        ledger.record("BBB", &hit(Signal::Bull, 0, "RSI Daily up"));
        ledger.record("BBB", &hit(Signal::Bull, 1, "GCross Short 20 vs Med 50"));

        let body = daily_summary(&ledger, 2, day());
        assert!(body.contains("2:\tBBB"));
        assert!(!body.contains("1:\tAAA"));
    }

    #[test]
    fn daily_summary_clips_long_reason_trails() {
        let mut ledger = Ledger::new();
        let long = "x".repeat(400);
        ledger.record("AAA", &hit(Signal::Bull, 0, &long));

        let body = daily_summary(&ledger, 0, day());
        let line = body.lines().find(|l| l.starts_with("1:")).unwrap();
        assert_eq!(line.len(), "1:\tAAA\t".len() + 120);
    }

    #[test]
    fn email_text_wraps_body_in_headers() {
        let text = email_text(
            "agent@example.com",
            &["one@example.com".to_string(), "two@example.com".to_string()],
            "hello",
        );
        assert!(text.starts_with("From: agent@example.com\n"));
        assert!(text.contains("To: one@example.com, two@example.com\n"));
        assert!(text.contains("Subject: Daily Stock Summary\n\nhello"));
    }

    #[test]
    fn backtest_report_empty_log_renders_nothing() {
        let log = ResultLog::new(80);
        assert!(backtest_report(&log, 0.1, &[1, 5]).is_none());
    }

    #[test]
    fn backtest_report_shows_both_tables() {
        let mut log = ResultLog::new(10);
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        log.record(SignalCode::Rsi, "AAA", Signal::Bull, 8, &prices);

        let report = backtest_report(&log, 0.1, &[1, 5]).unwrap();
        assert!(report.contains("Average Gain After Signal:"));
        assert!(report.contains("Number that Hit +/-10.0% gain/loss in bull/bear by:"));
        assert!(report.contains("Signal  Direction  1 Bar"));
        assert!(report.contains("rsi     Bull"));
    }

    #[test]
    fn check_listing_marks_enabled_checks() {
        let listing = check_listing(&[CheckKind::Rsi]);
        let rsi_line = listing.lines().find(|l| l.starts_with("rsi\t")).unwrap();
        assert!(rsi_line.ends_with("[enabled]"));
        let ctrl_line = listing.lines().find(|l| l.starts_with("ctrl\t")).unwrap();
        assert!(!ctrl_line.contains("[enabled]"));
    }
}
