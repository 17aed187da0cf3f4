use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VisionError {
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("invalid trading type: {0} (expected spot, um or cm)")]
    InvalidTradingType(String),

    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid date window: start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },

    #[error("invalid month: {0} (expected 1-12)")]
    InvalidMonth(u32),

    #[error("config file not found: {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("bucket listing request failed: {0}")]
    ListingHttp(String),

    #[error("bucket listing returned status {status}: {message}")]
    ListingStatus { status: u16, message: String },

    #[error("malformed bucket listing: {0}")]
    ListingParse(String),

    #[error("download request failed: {0}")]
    DownloadHttp(String),

    #[error("download returned status {status} for {key}")]
    DownloadStatus { status: u16, key: String },

    #[error("remote object not found: {0}")]
    ObjectNotFound(String),

    #[error("exchange request failed: {0}")]
    ExchangeHttp(String),

    #[error("exchange returned status {status}: {message}")]
    ExchangeStatus { status: u16, message: String },

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("malformed checksum file: {0}")]
    ChecksumFormat(String),

    #[error("archive is not a valid zip: {0}")]
    CorruptArchive(String),

    #[error("failed to start download workers: {0}")]
    WorkerPool(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl VisionError {
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            VisionError::ListingHttp(_)
                | VisionError::ListingStatus { .. }
                | VisionError::ListingParse(_)
                | VisionError::DownloadHttp(_)
                | VisionError::DownloadStatus { .. }
                | VisionError::ObjectNotFound(_)
                | VisionError::ExchangeHttp(_)
                | VisionError::ExchangeStatus { .. }
        )
    }
}
