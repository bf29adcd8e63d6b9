use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{CheckKind, FeedKind};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_csv_file() -> String {
    crate::export::CSV_FILE.into()
}

fn default_historical_bars() -> usize {
    500
}

fn default_html_file() -> String {
    crate::export::HTML_FILE.into()
}

fn default_multi_threshold() -> i64 {
    2
}

fn default_trigger_percent() -> f64 {
    10.0
}

fn default_periods() -> Vec<usize> {
    vec![1, 5, 10, 15, 20, 25]
}

fn default_analysis_days() -> usize {
    crate::backtest::DEFAULT_ANALYSIS_DAYS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Write through a `.new` temp file and rename into place.
    #[serde(default = "default_true")]
    pub safe_file_write: bool,
    #[serde(default = "default_csv_file")]
    pub csv_file: String,
    #[serde(default = "default_html_file")]
    pub html_file: String,
    /// Bars requested per fetch, enough to warm the slowest average.
    #[serde(default = "default_historical_bars")]
    pub historical_bars: usize,
}

#[derive(Debug, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    /// Feed that serves this symbol: `"binance"` | `"bitfinex"` | `"stooq"`
    pub source: String,
    /// Optional window override: four EMA windows short to long, or
    /// eight with the four MA windows appended.
    pub windows: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// How many past days to rescan; 0 looks at the latest bar only.
    #[serde(default)]
    pub backtest_days: usize,
    /// Per-day score that counts as "several checks at once".
    #[serde(default = "default_multi_threshold")]
    pub multi_threshold: i64,
    /// Move size counted as a hit in the backtest tables, in percent.
    #[serde(default = "default_trigger_percent")]
    pub trigger_percent: f64,
    /// Horizons (bars after trigger) shown in the backtest tables.
    #[serde(default = "default_periods")]
    pub periods: Vec<usize>,
    /// Days of price action tracked after each trigger.
    #[serde(default = "default_analysis_days")]
    pub analysis_days: usize,
    /// Instruments scoring inside (-min, min) stay out of the summary.
    #[serde(default)]
    pub min_report_score: i64,
    /// Check names to run; empty means the default set.
    #[serde(default)]
    pub checks: Vec<String>,
    /// Fixes the control check's RNG for reproducible runs.
    pub control_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backtest_days: 0,
            multi_threshold: default_multi_threshold(),
            trigger_percent: default_trigger_percent(),
            periods: default_periods(),
            analysis_days: default_analysis_days(),
            min_report_score: 0,
            checks: Vec::new(),
            control_seed: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    /// Emit the summary as a ready-to-send message. Usually off except
    /// on the cron run.
    #[serde(default)]
    pub send: bool,
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

/// Parse a comma-separated check list. The word "all" selects every
/// check; unknown names are validation errors.
pub fn parse_checks(spec: &str) -> Result<Vec<CheckKind>, Report<ConfigError>> {
    let names: Vec<String> = spec
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    checks_from_names(&names)
}

pub fn checks_from_names(names: &[String]) -> Result<Vec<CheckKind>, Report<ConfigError>> {
    if names.iter().any(|name| name == "all") {
        return Ok(CheckKind::ALL.to_vec());
    }

    let mut kinds = Vec::new();
    for name in names {
        match CheckKind::from_str(name) {
            Some(kind) => kinds.push(kind),
            None => {
                return Err(Report::new(ConfigError::Validation {
                    field: format!("checks: unknown check \"{name}\""),
                }));
            }
        }
    }
    Ok(kinds)
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_log_format(config)?;
    validate_instrument_symbols(config)?;
    validate_instrument_sources(config)?;
    validate_window_overrides(config)?;
    validate_check_names(config)?;
    validate_engine_numbers(config)?;
    validate_email(config)?;
    Ok(())
}

fn validate_log_format(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    match config.general.log_format.as_str() {
        "text" | "json" => Ok(()),
        other => Err(Report::new(ConfigError::Validation {
            field: format!("general.log_format \"{other}\" is not \"text\" or \"json\""),
        })),
    }
}

fn validate_instrument_symbols(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = std::collections::HashSet::new();
    for instrument in &config.instruments {
        if instrument.symbol.is_empty() {
            return Err(Report::new(ConfigError::Validation {
                field: "instruments: empty symbol".into(),
            }));
        }
        if !seen.insert(instrument.symbol.as_str()) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("instruments: duplicate symbol \"{}\"", instrument.symbol),
            }));
        }
    }
    Ok(())
}

fn validate_instrument_sources(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for instrument in &config.instruments {
        if FeedKind::from_str(&instrument.source).is_none() {
            return Err(Report::new(ConfigError::Validation {
                field: format!(
                    "instruments[symbol={}].source: unknown source \"{}\"",
                    instrument.symbol, instrument.source
                ),
            }));
        }
    }
    Ok(())
}

fn validate_window_overrides(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for instrument in &config.instruments {
        let Some(windows) = &instrument.windows else {
            continue;
        };

        if windows.len() != 4 && windows.len() != 8 {
            return Err(Report::new(ConfigError::Validation {
                field: format!(
                    "instruments[symbol={}].windows: expected 4 or 8 values, got {}",
                    instrument.symbol,
                    windows.len()
                ),
            }));
        }
        if windows.contains(&0) {
            return Err(Report::new(ConfigError::Validation {
                field: format!(
                    "instruments[symbol={}].windows: windows must be positive",
                    instrument.symbol
                ),
            }));
        }
    }
    Ok(())
}

fn validate_check_names(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    checks_from_names(&config.engine.checks).map(|_| ())
}

fn validate_engine_numbers(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let engine = &config.engine;
    if engine.trigger_percent <= 0.0 {
        return Err(Report::new(ConfigError::Validation {
            field: format!("engine.trigger_percent must be positive, got {}", engine.trigger_percent),
        }));
    }
    if engine.analysis_days == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "engine.analysis_days must be positive".into(),
        }));
    }
    if engine.periods.is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "engine.periods must not be empty".into(),
        }));
    }
    if engine.periods.contains(&0) {
        return Err(Report::new(ConfigError::Validation {
            field: "engine.periods must be positive".into(),
        }));
    }
    Ok(())
}

fn validate_email(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !config.email.send {
        return Ok(());
    }
    if config.email.from.is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "email.from is required when email.send is true".into(),
        }));
    }
    if config.email.to.is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "email.to is required when email.send is true".into(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
data_dir = "/tmp/data"
safe_file_write = false
csv_file = "prices.csv"
html_file = "prices.html"

[[instruments]]
symbol = "GOOG.O"
source = "stooq"

[[instruments]]
symbol = "BTCUSD"
source = "binance"
windows = [10, 21, 55, 89]

[engine]
backtest_days = 200
multi_threshold = 3
trigger_percent = 5.0
periods = [1, 5, 20]
analysis_days = 40
min_report_score = 2
checks = ["rsi", "seq", "bets"]
control_seed = 7

[email]
from = "agent@example.net"
to = ["me@example.net"]
send = true
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "debug");
        assert!(!config.general.safe_file_write);
        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.instruments[1].windows, Some(vec![10, 21, 55, 89]));
        assert_eq!(config.engine.backtest_days, 200);
        assert_eq!(config.engine.control_seed, Some(7));
        assert_eq!(config.email.to, vec!["me@example.net".to_string()]);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let toml = r#"
[general]
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.general.data_dir, "./data");
        assert!(config.general.safe_file_write);
        assert_eq!(config.general.csv_file, "export.csv");
        assert_eq!(config.general.html_file, "export.html");
        assert_eq!(config.general.historical_bars, 500);
        assert!(config.instruments.is_empty());
        assert_eq!(config.engine.backtest_days, 0);
        assert_eq!(config.engine.multi_threshold, 2);
        assert_eq!(config.engine.trigger_percent, 10.0);
        assert_eq!(config.engine.periods, vec![1, 5, 10, 15, 20, 25]);
        assert_eq!(config.engine.analysis_days, 80);
        assert_eq!(config.engine.min_report_score, 0);
        assert!(config.engine.checks.is_empty());
        assert_eq!(config.engine.control_seed, None);
        assert!(!config.email.send);
    }

    #[test]
    fn unknown_source_rejected() {
        let toml = r#"
[general]

[[instruments]]
symbol = "GOOG.O"
source = "worldtradingdata"
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn duplicate_symbols_rejected() {
        let toml = r#"
[general]

[[instruments]]
symbol = "GOOG.O"
source = "stooq"

[[instruments]]
symbol = "GOOG.O"
source = "stooq"
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn window_override_must_have_four_or_eight_values() {
        let toml = r#"
[general]

[[instruments]]
symbol = "BTCUSD"
source = "binance"
windows = [10, 21, 55, 89, 25]
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_window_rejected() {
        let toml = r#"
[general]

[[instruments]]
symbol = "BTCUSD"
source = "binance"
windows = [0, 21, 55, 89]
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_check_name_rejected() {
        let toml = r#"
[general]

[engine]
checks = ["rsi", "macd"]
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn bad_log_format_rejected() {
        let toml = r#"
[general]
log_format = "pretty"
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn send_without_recipients_rejected() {
        let toml = r#"
[general]

[email]
from = "agent@example.net"
send = true
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_trigger_percent_rejected() {
        let toml = r#"
[general]

[engine]
trigger_percent = 0.0
"#;
        let config = parse(toml);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn all_expands_to_every_check() {
        let kinds = parse_checks("all").expect("parse failed");
        assert_eq!(kinds.len(), CheckKind::ALL.len());
    }

    #[test]
    fn check_list_parses_and_trims() {
        let kinds = parse_checks("rsi, seq_w,bets").expect("parse failed");
        assert_eq!(kinds, vec![CheckKind::Rsi, CheckKind::SeqWeekly, CheckKind::Bets]);
    }

    #[test]
    fn unknown_check_in_list_rejected() {
        assert!(parse_checks("rsi,bollinger").is_err());
    }
}
