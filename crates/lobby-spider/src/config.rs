use crate::error::{Result, SpiderError};
use crate::http::*;
use crate::quiver::{BASE_URL, VENDOR_DATA_NAME, VENDOR_NAME};
use std::path::{Path, PathBuf};
use tracing::trace;

pub const TOKEN_VAR: &str = "QUIVER_AUTH_TOKEN";
pub const DESTINATION_VAR: &str = "LOBBY_DESTINATION";
pub const PROCESSED_VAR: &str = "LOBBY_PROCESSED";
pub const DATA_FOLDER_VAR: &str = "LOBBY_DATA_FOLDER";

const DEFAULT_DESTINATION: &str = "./output";
const DEFAULT_DATA_FOLDER: &str = "./data";

/// Everything a run needs to know about its surroundings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub token: String,
    pub base_url: String,
    /// Root output folder; files land in `<destination>/quiver/lobbying`.
    pub destination: PathBuf,
    /// Root of a published data set to merge against, laid out like `destination`.
    pub processed: Option<PathBuf>,
    /// Reference data root, holding `equity/usa/map_files`.
    pub data_folder: PathBuf,
}

impl Config {
    /// Read the `.env` file (if any) and the process environment; a given `token` takes the
    /// place of `QUIVER_AUTH_TOKEN`.
    pub fn from_env(token: Option<String>) -> Result<Self> {
        dotenv::dotenv().ok();

        let token = match token {
            Some(token) => token,
            None => var(TOKEN_VAR).map_err(|_| {
                SpiderError::Config(format!("environment variable {TOKEN_VAR} not set"))
            })?,
        };

        let config = Self {
            token,
            base_url: BASE_URL.to_string(),
            destination: var(DESTINATION_VAR)
                .unwrap_or_else(|_| DEFAULT_DESTINATION.to_string())
                .into(),
            processed: var(PROCESSED_VAR).ok().map(PathBuf::from),
            data_folder: var(DATA_FOLDER_VAR)
                .unwrap_or_else(|_| DEFAULT_DATA_FOLDER.to_string())
                .into(),
        };
        trace!("configuration read: {:?}", config.redacted());
        Ok(config)
    }

    /// A config with explicit values and the Quiver base url.
    pub fn new(
        token: impl Into<String>,
        destination: impl Into<PathBuf>,
        data_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            token: token.into(),
            base_url: BASE_URL.to_string(),
            destination: destination.into(),
            processed: None,
            data_folder: data_folder.into(),
        }
    }

    /// `<destination>/quiver/lobbying`
    pub fn output_folder(&self) -> PathBuf {
        vendor_folder(&self.destination)
    }

    /// `<processed>/quiver/lobbying`, if configured.
    pub fn processed_folder(&self) -> Option<PathBuf> {
        self.processed.as_deref().map(vendor_folder)
    }

    /// Copy safe to log.
    pub fn redacted(&self) -> Self {
        Self {
            token: "***".to_string(),
            ..self.clone()
        }
    }
}

fn vendor_folder(root: &Path) -> PathBuf {
    root.join(VENDOR_NAME).join(VENDOR_DATA_NAME)
}
