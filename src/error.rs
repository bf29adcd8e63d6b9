use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum FeedError {
    #[display("request to {feed} failed")]
    Request { feed: String },
    #[display("failed to parse response from {feed}")]
    ResponseParse { feed: String },
}

#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("failed to read {path}")]
    ReadFile { path: String },
    #[display("failed to parse {path}")]
    ParseFile { path: String },
    #[display("failed to write {path}")]
    WriteFile { path: String },
}

#[derive(Debug, Display, Error)]
pub enum BetError {
    #[display("invalid bet spec: {reason}")]
    InvalidSpec { reason: String },
}
