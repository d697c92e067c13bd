//! One run of the lobbying spider: fetch a day of disclosures, lay them out as csv lines and
//! merge them into the per-ticker and universe files.
//!
//! ```text
//! Idle -> Validating -> Fetching -> Decoding -> Partitioning -> Merging -> Done
//!            \______________\___________\______________\____________\---> Failed
//! ```
//!
//! Nothing escapes [`Pipeline::run`] but a bool; every failure is logged where it ends the run.

use crate::config::Config;
use crate::error::{Result, SpiderError};
use crate::fetch::{ApiClient, HttpFetcher, Transport};
use crate::fs::{Folder, MergeWriter, Merged};
use crate::quiver::lobbying::{self, LINE_DATE_FORMAT};
use crate::quiver::partition::{self, Partition};
use crate::quiver::lobbying_url;
use crate::rate_limit::RateLimiter;
use crate::resolver::{IdentifierResolver, MapFileResolver};
use crate::tui;
use chrono::{NaiveDate, Utc};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Processing date meaning "not set".
pub const UNSET_DATE: NaiveDate = NaiveDate::MIN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    Fetching,
    Decoding,
    Partitioning,
    Merging,
    Done,
    Failed,
}

/// What a run did, and where it stopped.
#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    /// `Done` or `Failed`.
    pub stage: Stage,
    /// Stage that failed, if any.
    pub failed_at: Option<Stage>,
    pub error: Option<SpiderError>,
    pub universe_file: Option<Merged>,
    pub ticker_files: Vec<Merged>,
    pub elapsed: Duration,
}

impl RunReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            stage: Stage::Idle,
            failed_at: None,
            error: None,
            universe_file: None,
            ticker_files: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn advance(&mut self, stage: Stage) {
        trace!("{}: {:?} -> {stage:?}", self.date, self.stage);
        self.stage = stage;
    }

    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn files_written(&self) -> usize {
        self.ticker_files.len() + usize::from(self.universe_file.is_some())
    }

    /// Every file touched by the run, universe file first.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.universe_file
            .iter()
            .chain(self.ticker_files.iter())
            .map(|merged| merged.path.clone())
            .collect()
    }
}

/// The download-merge pipeline over some transport and identifier resolver.
pub struct Pipeline<T: Transport, R: IdentifierResolver> {
    fetcher: HttpFetcher<T>,
    resolver: R,
    writer: MergeWriter,
    base_url: String,
    tui: bool,
}

impl Pipeline<ApiClient, MapFileResolver> {
    /// Production wiring: authenticated reqwest client, Quiver's rate limit, map files from the
    /// data folder, output under `<destination>/quiver/lobbying`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.token)?;
        let fetcher = HttpFetcher::new(client, RateLimiter::quiver());
        let resolver = MapFileResolver::load(&config.data_folder)?;
        let writer = MergeWriter::new(config.output_folder(), config.processed_folder());

        Ok(Self::new(fetcher, resolver, writer, &config.base_url))
    }
}

impl<T: Transport, R: IdentifierResolver> Pipeline<T, R> {
    pub fn new(fetcher: HttpFetcher<T>, resolver: R, writer: MergeWriter, base_url: &str) -> Self {
        Self {
            fetcher,
            resolver,
            writer,
            base_url: base_url.to_string(),
            tui: false,
        }
    }

    /// Show banners and a progress bar instead of relying on tracing output.
    pub fn with_tui(mut self, tui: bool) -> Self {
        self.tui = tui;
        self
    }

    pub fn fetcher(&self) -> &HttpFetcher<T> {
        &self.fetcher
    }

    /// Process one day; `true` if at least one file was written.
    pub async fn run(&mut self, date: NaiveDate) -> bool {
        self.execute(date).await.succeeded()
    }

    /// [`Pipeline::run`], keeping the details.
    pub async fn execute(&mut self, date: NaiveDate) -> RunReport {
        let time = std::time::Instant::now();
        info!("start downloading/processing Quiver lobbying data for {date}");
        if self.tui {
            tui::banner(&format!("Quiver lobbying {date}"));
        }

        let mut report = RunReport::new(date);
        match self.process(date, &mut report).await {
            Ok(()) => {
                report.advance(Stage::Done);
                info!(
                    "finished {date}: {} ticker files, universe file: {}. {}",
                    report.ticker_files.len(),
                    report.universe_file.is_some(),
                    crate::time_elapsed(time)
                );
            }
            Err(err) => {
                match &err {
                    SpiderError::InvalidDate(_) => {
                        warn!("encountered data from invalid date: {date} - skipping")
                    }
                    SpiderError::NotFound { .. } => {
                        info!("no lobbying data for {date}, nothing to process")
                    }
                    _ => error!("run for {date} failed while {:?}, error({err})", report.stage),
                }
                report.failed_at = Some(report.stage);
                report.error = Some(err);
                report.advance(Stage::Failed);
            }
        }

        report.elapsed = time.elapsed();
        if self.tui {
            let outcome = if report.succeeded() { "done" } else { "failed" };
            println!("lobbying {date} ... {outcome} ({:?})\n", report.elapsed);
        }
        report
    }

    async fn process(&mut self, date: NaiveDate, report: &mut RunReport) -> Result<()> {
        report.advance(Stage::Validating);
        validate(date, Utc::now().date_naive())?;

        report.advance(Stage::Fetching);
        let url = lobbying_url(&self.base_url, date);
        let body = self.fetcher.fetch(&url).await?;
        if body.trim().is_empty() {
            // already logged by the fetcher
            return Err(SpiderError::NotFound { url });
        }

        report.advance(Stage::Decoding);
        let records = lobbying::decode(&body)?;

        report.advance(Stage::Partitioning);
        let partition = partition::partition(&records, &self.resolver);

        report.advance(Stage::Merging);
        let files = partition.by_ticker.len() + usize::from(!partition.universe.is_empty());
        let pb = tui::merge_progress(files, self.tui);
        let merged = self.merge(date, &partition, &pb, report).await;
        pb.finish_and_clear();
        merged?;

        if report.files_written() == 0 {
            return Err(SpiderError::NoOutput(date));
        }
        Ok(())
    }

    /// Universe file first, then one file per ticker; the first failure stops the run.
    async fn merge(
        &self,
        date: NaiveDate,
        partition: &Partition,
        pb: &ProgressBar,
        report: &mut RunReport,
    ) -> Result<()> {
        if !partition.universe_enabled {
            warn!("universe file for {date} not produced: identifier resolution unavailable");
        } else if !partition.universe.is_empty() {
            let key = date.format(LINE_DATE_FORMAT).to_string();
            let merged = self
                .writer
                .merge(Folder::Universe, &key, &partition.universe)
                .await
                .map_err(|err| {
                    error!("failed to merge universe file {key}, error({err})");
                    err
                })?;
            pb.inc(1);
            report.universe_file = Some(merged);
        }

        for (ticker, lines) in &partition.by_ticker {
            let merged = self
                .writer
                .merge(Folder::Ticker, ticker, lines)
                .await
                .map_err(|err| {
                    error!("failed to merge [{ticker}] lobbying file, error({err})");
                    err
                })?;
            pb.inc(1);
            report.ticker_files.push(merged);
        }

        debug!(
            "merged {} ticker lines into {} files",
            partition.ticker_line_count(),
            report.ticker_files.len()
        );
        Ok(())
    }
}

/// Only past, set dates are processed.
pub fn validate(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date >= today || date == UNSET_DATE {
        return Err(SpiderError::InvalidDate(date));
    }
    Ok(())
}
