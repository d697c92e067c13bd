use crate::error::{Result, SpiderError};
use crate::quiver::lobbying::LINE_DATE_FORMAT;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, trace};

/// Universe files live in this subfolder of the destination.
pub const UNIVERSE_FOLDER: &str = "universe";

/// The two families of csv files, which differ in location and sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Folder {
    /// `<destination>/<ticker>.csv`, sorted by the leading `YYYYMMDD`.
    Ticker,
    /// `<destination>/universe/<YYYYMMDD>.csv`, sorted by the leading identifier.
    Universe,
}

/// Outcome of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub path: PathBuf,
    /// Lines in the rewritten file.
    pub lines: usize,
    /// Lines that weren't in the file before.
    pub added: usize,
}

/// Read-union-sort-rewrite of csv files.
///
/// Every merge leaves the target holding the sorted set of all lines ever merged into it, so
/// writing the same lines twice is a no-op. Existing lines come from `processed` when set
/// (a published copy of the data set), otherwise from the destination itself.
#[derive(Debug, Clone)]
pub struct MergeWriter {
    destination: PathBuf,
    processed: Option<PathBuf>,
}

impl MergeWriter {
    pub fn new(destination: impl Into<PathBuf>, processed: Option<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            processed,
        }
    }

    /// Final location of `key` in `folder`; keys are lowercased.
    pub fn path(&self, folder: Folder, key: &str) -> PathBuf {
        folder_path(&self.destination, folder).join(file_name(key))
    }

    /// Where existing lines for `key` are read from.
    fn source_path(&self, folder: Folder, key: &str) -> PathBuf {
        let root = self.processed.as_deref().unwrap_or(&self.destination);
        folder_path(root, folder).join(file_name(key))
    }

    pub async fn merge(&self, folder: Folder, key: &str, new_lines: &[String]) -> Result<Merged> {
        if !is_file_key(key) {
            error!("refusing to merge into file key {key:?}");
            return Err(SpiderError::InvalidKey(key.to_string()));
        }
        let path = self.path(folder, key);
        let source = self.source_path(folder, key);

        let mut lines = read_lines(&source).await?;
        let before = lines.len();
        lines.extend(new_lines.iter().filter(|line| !line.is_empty()).cloned());
        let added = lines.len() - before;

        let sorted = sort_lines(folder, lines, &source)?;
        write_atomic(&path, &sorted).await?;

        trace!(
            "merged {} new lines into {} ({added} added, {} total)",
            new_lines.len(),
            path.display(),
            sorted.len()
        );

        Ok(Merged {
            path,
            lines: sorted.len(),
            added,
        })
    }
}

fn folder_path(root: &Path, folder: Folder) -> PathBuf {
    match folder {
        Folder::Ticker => root.to_path_buf(),
        Folder::Universe => root.join(UNIVERSE_FOLDER),
    }
}

/// A key that names a single file directly inside its folder: ascii letters, digits and
/// `.-_^`, not starting with a dot.
pub fn is_file_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '^'))
}

fn file_name(key: &str) -> String {
    format!("{}.csv", key.to_lowercase())
}

/// Non-empty lines of `path`, or an empty set if there's no file yet.
async fn read_lines(path: &Path) -> Result<BTreeSet<String>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            trace!("no existing file at {}", path.display());
            return Ok(BTreeSet::new());
        }
        Err(err) => {
            error!("failed to read {}, error({err})", path.display());
            return Err(SpiderError::io(path, err));
        }
    };

    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Order a line set by its sort key; ties (same key, different line) fall back to the line
/// itself so the output only depends on the set.
fn sort_lines(folder: Folder, lines: BTreeSet<String>, source: &Path) -> Result<Vec<String>> {
    match folder {
        Folder::Universe => {
            let mut lines: Vec<String> = lines.into_iter().collect();
            lines.sort_by(|a, b| first_field(a).cmp(first_field(b)).then_with(|| a.cmp(b)));
            Ok(lines)
        }
        Folder::Ticker => {
            let mut keyed = lines
                .into_iter()
                .map(|line| match line_date(&line) {
                    Some(date) => Ok((date, line)),
                    None => {
                        error!("malformed line in {}: {line:?}", source.display());
                        Err(SpiderError::MalformedLine {
                            path: source.to_path_buf(),
                            line,
                        })
                    }
                })
                .collect::<Result<Vec<(NaiveDate, String)>>>()?;
            keyed.sort_by(|(date_a, a), (date_b, b)| match date_a.cmp(date_b) {
                Ordering::Equal => a.cmp(b),
                other => other,
            });
            Ok(keyed.into_iter().map(|(_, line)| line).collect())
        }
    }
}

fn first_field(line: &str) -> &str {
    line.split(',').next().unwrap_or_default()
}

fn line_date(line: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(first_field(line), LINE_DATE_FORMAT).ok()
}

/// Write `lines` (each newline terminated) to a sibling `.tmp` file, then rename it over
/// `path`; a failure leaves whatever was at `path` untouched.
async fn write_atomic(path: &Path, lines: &[String]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| SpiderError::Config(format!("no parent directory for {}", path.display())))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| SpiderError::io(dir, err))?;

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let mut content = String::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = written {
        error!("failed to write {}, error({err})", path.display());
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(SpiderError::io(path, err));
    }

    debug!("wrote {} lines to {}", lines.len(), path.display());
    Ok(())
}
