mod backtest;
mod bet;
mod config;
mod engine;
mod error;
mod export;
mod feed;
mod indicator;
mod ledger;
mod model;
mod report;
mod series;
mod storage;
mod trigger;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bet::Bet;
use config::{AppConfig, InstrumentConfig};
use engine::{Engine, EngineSettings};
use feed::FeedSet;
use model::{CheckKind, FeedKind, PriceHistory};
use storage::Store;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("price feed error")]
    Feed,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "price-agent", about = "Daily price-history signal scanner")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Only scan instruments whose symbol contains this string
    #[arg(short, long)]
    ticker: Option<String>,

    /// Rescan this many past days on top of the latest bar
    #[arg(short, long)]
    backtest: Option<usize>,

    /// Comma-separated check names to run, or "all"
    #[arg(long)]
    checks: Option<String>,

    /// Day score that trips the multi check
    #[arg(long)]
    multi: Option<i64>,

    /// Hit threshold for the backtest tables, in percent
    #[arg(long)]
    percent: Option<f64>,

    /// Minimum score for an instrument to make the daily summary
    #[arg(long)]
    score: Option<i64>,

    /// Fetch history even when today's bar is already cached
    #[arg(long)]
    fetch_history: bool,

    /// Wrap the daily summary in email headers on stdout
    #[arg(long)]
    email: bool,

    /// Place a bet per selected instrument, spec form
    /// price/target/stop/days/confidence/start/comment
    #[arg(long, value_name = "SPEC")]
    bet: Option<String>,

    /// List every check with its code and description, then exit
    #[arg(long)]
    list_checks: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let checks: Vec<CheckKind> = match &cli.checks {
        Some(spec) => config::parse_checks(spec).change_context(AppError::Config)?,
        None if !config.engine.checks.is_empty() => {
            config::checks_from_names(&config.engine.checks).change_context(AppError::Config)?
        }
        None => CheckKind::default_set(),
    };

    if cli.list_checks {
        println!("{}", report::check_listing(&checks));
        return Ok(());
    }

    let backtest_days = cli.backtest.unwrap_or(config.engine.backtest_days);
    let multi_threshold = cli.multi.unwrap_or(config.engine.multi_threshold);
    let trigger_percent = cli.percent.unwrap_or(config.engine.trigger_percent);
    let min_report_score = cli.score.unwrap_or(config.engine.min_report_score);
    let send_email = cli.email || config.email.send;
    let today = Utc::now().date_naive();

    info!(date = %today, send_email, backtest_days, "checking instruments");

    // ── Storage ───────────────────────────────────────────────────────────────
    let data_dir = &config.general.data_dir;
    std::fs::create_dir_all(data_dir)
        .change_context(AppError::Storage)
        .attach_with(|| format!("data_dir: {data_dir}"))?;

    let store = Arc::new(Store::new(data_dir.clone(), config.general.safe_file_write));
    let mut bets = store.load_bets().change_context(AppError::Storage)?;

    // ── Instruments ───────────────────────────────────────────────────────────
    let filter = cli.ticker.as_deref().unwrap_or_default().to_lowercase();
    let instruments: Vec<&InstrumentConfig> = config
        .instruments
        .iter()
        .filter(|instrument| instrument.symbol.to_lowercase().contains(&filter))
        .collect();

    if instruments.is_empty() {
        tracing::warn!("no instruments selected; nothing to do");
        return Ok(());
    }

    // ── History refresh ───────────────────────────────────────────────────────
    // Every feed rate-limits itself through governor, so all jobs can be
    // spawned at once.
    let feeds = Arc::new(FeedSet::new());
    let mut fetch_handles = Vec::new();
    for instrument in &instruments {
        let Some(source) = FeedKind::from_str(&instrument.source) else {
            tracing::warn!(
                source = instrument.source.as_str(),
                "unknown source in config, skipping"
            );
            continue;
        };

        let symbol = instrument.symbol.clone();
        let feeds = Arc::clone(&feeds);
        let store = Arc::clone(&store);
        let limit = config.general.historical_bars;
        let force = cli.fetch_history;
        let handle = tokio::spawn(async move {
            if let Err(e) =
                refresh_history(feeds.as_ref(), store.as_ref(), &symbol, source, limit, force).await
            {
                tracing::warn!(error = ?e, symbol = symbol.as_str(), "history fetch failed (continuing)");
            }
        });
        fetch_handles.push(handle);
    }

    for handle in fetch_handles {
        handle.await.change_context(AppError::Runtime)?;
    }

    // ── Bet placement ─────────────────────────────────────────────────────────
    if let Some(spec) = &cli.bet {
        for instrument in &instruments {
            let history = store.load_history(&instrument.symbol).unwrap_or_default();
            let last_close =
                history.values().next_back().map(|bar| bar.close).unwrap_or_default();
            let bet = Bet::from_spec(&instrument.symbol, spec, last_close, today)
                .change_context(AppError::Runtime)?;
            info!(symbol = instrument.symbol.as_str(), %bet, "placing bet");
            bets.push(bet);
        }
    }

    // ── Scan ──────────────────────────────────────────────────────────────────
    let settings = EngineSettings {
        checks: checks.iter().copied().collect(),
        backtest_days,
        multi_threshold,
        analysis_days: config.engine.analysis_days,
        window_overrides: window_overrides(&instruments),
    };
    let rng = match config.engine.control_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut engine = Engine::new(settings, bets, rng);
    for instrument in &instruments {
        let history = match store.load_history(&instrument.symbol) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    symbol = instrument.symbol.as_str(),
                    "cached history unreadable, skipping"
                );
                continue;
            }
        };
        engine.scan_instrument(&instrument.symbol, &history);
    }
    let output = engine.finish();

    // ── Reports ───────────────────────────────────────────────────────────────
    for line in output.ledger.alerts() {
        println!("{line}");
    }
    println!("{}", report::summary_table(&output.summaries));

    store.save_bets(&output.bets).change_context(AppError::Storage)?;

    let body = report::daily_summary(&output.ledger, min_report_score, today);
    if send_email {
        println!("{}", report::email_text(&config.email.from, &config.email.to, &body));
    } else {
        println!("{body}");
    }

    let updates: Vec<(String, f64)> = output
        .summaries
        .iter()
        .map(|summary| (summary.symbol.clone(), summary.last_price))
        .collect();
    export::write_latest_prices(
        store.as_ref(),
        &store.export_path(&config.general.csv_file),
        &store.export_path(&config.general.html_file),
        &updates,
    )
    .change_context(AppError::Storage)?;

    let trigger_fraction = trigger_percent / 100.0;
    if let Some(tables) =
        report::backtest_report(&output.results, trigger_fraction, &config.engine.periods)
    {
        println!("{tables}");
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn window_overrides(instruments: &[&InstrumentConfig]) -> HashMap<String, Vec<usize>> {
    instruments
        .iter()
        .filter_map(|instrument| {
            instrument.windows.clone().map(|windows| (instrument.symbol.clone(), windows))
        })
        .collect()
}

/// Merge freshly fetched bars into the cached history and rewrite it.
/// Skipped when the cache already holds today's bar, unless forced.
async fn refresh_history(
    feeds: &FeedSet,
    store: &Store,
    symbol: &str,
    source: FeedKind,
    limit: usize,
    force: bool,
) -> Result<(), Report<AppError>> {
    let mut history = match store.load_history(symbol) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(error = ?e, symbol, "cached history unreadable, starting over");
            PriceHistory::new()
        }
    };

    if !force && !storage::needs_fetch(&history, Utc::now().date_naive()) {
        tracing::debug!(symbol, "history already has today's bar");
        return Ok(());
    }

    let bars = feeds
        .feed(source)
        .fetch_daily(symbol, limit)
        .await
        .change_context(AppError::Feed)?;

    let fetched = bars.len();
    for (date, bar) in bars {
        history.insert(date, bar);
    }

    store
        .save_history(symbol, &history)
        .change_context(AppError::Storage)?;

    info!(symbol, source = %source, fetched, total = history.len(), "history refreshed");
    Ok(())
}
