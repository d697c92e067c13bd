//! Ticker -> stable security identifier resolution.
//!
//! Universe files are keyed by an identifier that survives ticker changes. The pipeline only
//! depends on [`IdentifierResolver`]; [`MapFileResolver`] is the local implementation built on
//! map files, one csv per security:
//!
//! ```text
//! equity/usa/map_files/fb.csv
//!     20120518,fb,Q
//!     20220608,fb,Q
//!     20501231,meta,Q
//! ```
//!
//! Each row reads "traded as `ticker` up to and including this date". The identifier of a
//! security is its first ticker and first date, e.g. `FB 20120518`.

use crate::error::{Result, SpiderError};
use crate::quiver::lobbying::LINE_DATE_FORMAT;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};

pub trait IdentifierResolver {
    /// `Ok(())` if reference data is present for this run; otherwise
    /// [`SpiderError::ResolutionUnavailable`] and universe production is skipped.
    fn available(&self) -> Result<()>;

    /// Identifier for `ticker` as of `date`, if one is known.
    fn resolve(&self, ticker: &str, date: NaiveDate) -> Option<String>;
}

/// Map files location under a data folder.
pub fn map_files_dir(data_folder: &Path) -> PathBuf {
    data_folder.join("equity").join("usa").join("map_files")
}

#[derive(Debug)]
struct MapFile {
    /// (last date, ticker), ascending by date.
    rows: Vec<(NaiveDate, String)>,
}

impl MapFile {
    fn identifier(&self) -> Option<String> {
        let (first_date, first_ticker) = self.rows.first()?;
        Some(format!(
            "{} {}",
            first_ticker.to_uppercase(),
            first_date.format(LINE_DATE_FORMAT)
        ))
    }

    /// Ticker in use on `date`, if the security was listed then.
    fn ticker_on(&self, date: NaiveDate) -> Option<&str> {
        self.rows
            .iter()
            .find(|(until, _)| *until >= date)
            .map(|(_, ticker)| ticker.as_str())
    }
}

/// Resolver over a directory of map files, loaded once up front.
#[derive(Debug)]
pub struct MapFileResolver {
    dir: PathBuf,
    files: Vec<MapFile>,
    /// Uppercased ticker -> indices into `files` of every security that ever used it.
    by_ticker: HashMap<String, Vec<usize>>,
}

impl MapFileResolver {
    /// Load every `*.csv` in `<data_folder>/equity/usa/map_files`.
    ///
    /// A missing directory isn't an error here: the resolver then reports itself unavailable.
    pub fn load(data_folder: &Path) -> Result<Self> {
        let time = std::time::Instant::now();
        let dir = map_files_dir(data_folder);
        let mut resolver = Self {
            dir: dir.clone(),
            files: Vec::new(),
            by_ticker: HashMap::new(),
        };

        if !dir.is_dir() {
            warn!("map files not found at {}", dir.display());
            return Ok(resolver);
        }

        let entries = std::fs::read_dir(&dir).map_err(|err| {
            error!("failed to read map files directory {}, error({err})", dir.display());
            SpiderError::io(&dir, err)
        })?;

        for entry in entries {
            let path = entry.map_err(|err| SpiderError::io(&dir, err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                continue;
            }

            let content =
                std::fs::read_to_string(&path).map_err(|err| SpiderError::io(&path, err))?;
            match parse_map_file(&content) {
                Some(file) => resolver.insert(file),
                None => warn!("skipping unreadable map file {}", path.display()),
            }
        }

        debug!(
            "loaded {} map files from {}. {}",
            resolver.files.len(),
            dir.display(),
            crate::time_elapsed(time)
        );
        Ok(resolver)
    }

    fn insert(&mut self, file: MapFile) {
        let index = self.files.len();
        let mut tickers: Vec<String> = file
            .rows
            .iter()
            .map(|(_, ticker)| ticker.to_uppercase())
            .collect();
        tickers.sort();
        tickers.dedup();
        for ticker in tickers {
            self.by_ticker.entry(ticker).or_default().push(index);
        }
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IdentifierResolver for MapFileResolver {
    fn available(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(SpiderError::ResolutionUnavailable(format!(
                "no map files under {}",
                self.dir.display()
            )));
        }
        Ok(())
    }

    fn resolve(&self, ticker: &str, date: NaiveDate) -> Option<String> {
        let ticker = ticker.to_uppercase();
        let candidates = self.by_ticker.get(&ticker)?;

        let identifier = candidates
            .iter()
            .map(|index| &self.files[*index])
            .find(|file| {
                file.ticker_on(date)
                    .is_some_and(|on_date| on_date.eq_ignore_ascii_case(&ticker))
            })
            .and_then(MapFile::identifier);

        trace!("resolved [{ticker}] on {date} to {identifier:?}");
        identifier
    }
}

/// Rows are `YYYYMMDD,ticker[,...]`; blank lines are skipped, anything else unreadable
/// rejects the file.
fn parse_map_file(content: &str) -> Option<MapFile> {
    let mut rows = Vec::new();
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut fields = line.split(',');
        let date = NaiveDate::parse_from_str(fields.next()?, LINE_DATE_FORMAT).ok()?;
        let ticker = fields.next()?.trim();
        if ticker.is_empty() {
            return None;
        }
        rows.push((date, ticker.to_string()));
    }
    if rows.is_empty() {
        return None;
    }
    rows.sort_by_key(|(date, _)| *date);
    Some(MapFile { rows })
}
