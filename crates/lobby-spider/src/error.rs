use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpiderError>;

/// Everything that can go wrong between the Quiver API and the csv files on disk.
///
/// Only some of these end a run; the pipeline decides which (see [`crate::pipeline`]).
#[derive(Debug, Error)]
pub enum SpiderError {
    /// Processing date is today (or later), or the unset sentinel.
    #[error("invalid processing date {0}")]
    InvalidDate(NaiveDate),

    /// HTTP 404; the fetcher turns this into an empty body.
    #[error("no data found at {url}")]
    NotFound { url: String },

    /// HTTP 401 after the single re-issue to the redirected url.
    #[error("unauthorized at {url}")]
    Unauthorized { url: String },

    /// Any other non-2xx status.
    #[error("HTTP {status} at {url}")]
    Status { status: u16, url: String },

    /// Connection, timeout or body read failure.
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),

    #[error("request failed with no more retries remaining (retry {attempts}/{attempts})")]
    RetriesExhausted { attempts: u32 },

    #[error("failed to decode lobbying response: {0}")]
    Decode(String),

    /// The identifier resolver cannot serve this run; universe files are skipped.
    #[error("identifier resolution unavailable: {0}")]
    ResolutionUnavailable(String),

    /// The run got this far without producing a single file.
    #[error("no lobbying files written for {0}")]
    NoOutput(NaiveDate),

    /// A file key that would not name a single file inside its folder.
    #[error("invalid file key {0:?}")]
    InvalidKey(String),

    #[error("malformed line in {}: {line:?}", path.display())]
    MalformedLine { path: PathBuf, line: String },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SpiderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpiderError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SpiderError {
    fn from(err: serde_json::Error) -> Self {
        SpiderError::Decode(err.to_string())
    }
}
