use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use tracing::info;

use crate::bet::Bet;
use crate::error::StorageError;
use crate::model::PriceHistory;

const HISTORY_DIR: &str = "history";
const BETS_FILE: &str = "bets.json";

/// File-backed state the agent owns: per-instrument price histories and
/// the bet book. Every write goes through the write-then-rename path so
/// an interrupted run never leaves a half-written file behind; config
/// can switch that off for filesystems where rename-over is not atomic.
pub struct Store {
    data_dir: PathBuf,
    safe_file_write: bool,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>, safe_file_write: bool) -> Self {
        Self { data_dir: data_dir.into(), safe_file_write }
    }

    /// Cached history for one instrument; a missing file is a first run
    /// and reads as empty.
    pub fn load_history(&self, symbol: &str) -> Result<PriceHistory, Report<StorageError>> {
        let path = self.history_path(symbol);
        read_json_or_default(&path)
    }

    pub fn save_history(
        &self,
        symbol: &str,
        history: &PriceHistory,
    ) -> Result<(), Report<StorageError>> {
        let path = self.history_path(symbol);
        let json = to_pretty_json(history, &path)?;
        self.write_atomic(&path, &json)
    }

    /// The bet book; a missing file starts an empty one.
    pub fn load_bets(&self) -> Result<Vec<Bet>, Report<StorageError>> {
        let path = self.bets_path();
        let bets: Vec<Bet> = read_json_or_default(&path)?;
        if bets.is_empty() {
            info!(path = %path.display(), "no bet book on disk, starting empty");
        }
        Ok(bets)
    }

    pub fn save_bets(&self, bets: &[Bet]) -> Result<(), Report<StorageError>> {
        let path = self.bets_path();
        let json = to_pretty_json(&bets, &path)?;
        self.write_atomic(&path, &json)
    }

    /// Write a file the agent owns, creating parent directories. In safe
    /// mode the contents land in `<path>.new` first and replace the old
    /// file by rename.
    pub fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), Report<StorageError>> {
        let context = || StorageError::WriteFile { path: path.display().to_string() };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).change_context_lazy(context)?;
            }
        }

        if !self.safe_file_write {
            return fs::write(path, contents).change_context_lazy(context);
        }

        let mut staging = OsString::from(path.as_os_str());
        staging.push(".new");
        let staging = PathBuf::from(staging);
        fs::write(&staging, contents).change_context_lazy(context)?;
        fs::rename(&staging, path).change_context_lazy(context)
    }

    pub fn export_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    fn history_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(HISTORY_DIR).join(format!("{symbol}.json"))
    }

    fn bets_path(&self) -> PathBuf {
        self.data_dir.join(BETS_FILE)
    }
}

/// A cached history is current when today's bar is already in it.
pub fn needs_fetch(history: &PriceHistory, today: NaiveDate) -> bool {
    !history.contains_key(&today.format("%Y-%m-%d").to_string())
}

fn read_json_or_default<T>(path: &Path) -> Result<T, Report<StorageError>>
where
    T: serde::de::DeserializeOwned + Default,
{
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => {
            return Err(Report::new(err)
                .change_context(StorageError::ReadFile { path: path.display().to_string() }));
        }
    };
    serde_json::from_str(&text)
        .change_context(StorageError::ParseFile { path: path.display().to_string() })
}

fn to_pretty_json<T: serde::Serialize>(
    value: &T,
    path: &Path,
) -> Result<String, Report<StorageError>> {
    serde_json::to_string_pretty(value)
        .change_context(StorageError::WriteFile { path: path.display().to_string() })
}
