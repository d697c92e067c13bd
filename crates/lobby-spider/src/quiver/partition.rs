use super::lobbying::LobbyingRecord;
use crate::fs::is_file_key;
use crate::resolver::IdentifierResolver;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Lines produced from one batch of records.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// Uppercased ticker -> `YYYYMMDD,client,issue,specificIssue,amount` lines, in input order.
    pub by_ticker: BTreeMap<String, Vec<String>>,
    /// `identifier,ticker,client,issue,specificIssue,amount` lines, in input order.
    pub universe: Vec<String>,
    /// False when the resolver was unavailable and no universe lines were attempted.
    pub universe_enabled: bool,
}

impl Partition {
    pub fn ticker_line_count(&self) -> usize {
        self.by_ticker.values().map(Vec::len).sum()
    }
}

/// Split records into per-ticker lines and, when the resolver can serve this run, universe
/// lines keyed by resolved identifier.
///
/// A record whose ticker doesn't resolve is left out of the universe lines only. Share class
/// separators are written as dots (`BRK/B` -> `BRK.B`); records whose ticker still can't name a
/// file are skipped entirely.
pub fn partition<R>(records: &[LobbyingRecord], resolver: &R) -> Partition
where
    R: IdentifierResolver + ?Sized,
{
    let universe_enabled = match resolver.available() {
        Ok(()) => true,
        Err(err) => {
            warn!("skipping universe lines for this batch: {err}");
            false
        }
    };

    let mut partition = Partition {
        universe_enabled,
        ..Partition::default()
    };
    let mut unresolved = 0usize;
    let mut skipped = 0usize;

    for record in records {
        let Some(ticker) = file_ticker(&record.ticker) else {
            warn!("skipping record with unusable ticker {:?}", record.ticker);
            skipped += 1;
            continue;
        };
        let row = record.row();
        let date = record.effective_date_key();

        partition
            .by_ticker
            .entry(ticker.clone())
            .or_default()
            .push(format!("{date},{row}"));

        if !universe_enabled {
            continue;
        }

        match resolver.resolve(&record.ticker, record.effective_date) {
            Some(identifier) => partition
                .universe
                .push(format!("{identifier},{ticker},{row}")),
            None => {
                trace!("no identifier for [{ticker}] on {date}");
                unresolved += 1;
            }
        }
    }

    debug!(
        "partitioned {} records into {} tickers, {} universe lines \
        ({unresolved} unresolved, {skipped} skipped)",
        records.len(),
        partition.by_ticker.len(),
        partition.universe.len()
    );

    partition
}

/// Ticker as used for its file name and in universe lines.
fn file_ticker(ticker: &str) -> Option<String> {
    let ticker = ticker.replace('/', ".");
    is_file_key(&ticker).then_some(ticker)
}
