use crate::error::{Result, SpiderError};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use tracing::{debug, error};

/// Date layout of the leading field of every csv line.
pub const LINE_DATE_FORMAT: &str = "%Y%m%d";

// decode
// ----------------------------------------------------------------------------

/// Parse a Quiver lobbying response (a JSON array) into records, in response order.
pub fn decode(body: &str) -> Result<Vec<LobbyingRecord>> {
    let time = std::time::Instant::now();

    let raw: Vec<RawLobbying> = serde_json::from_str(body).map_err(|err| {
        error!("failed to parse lobbying JSON, error({err})");
        SpiderError::from(err)
    })?;

    let records = raw
        .into_iter()
        .map(LobbyingRecord::try_from)
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "decoded {} lobbying records. {}",
        records.len(),
        crate::time_elapsed(time)
    );
    Ok(records)
}

// de
// ----------------------------------------------------------------------------

/// One element of the response array, exactly as Quiver sends it.
#[derive(Debug, Deserialize)]
pub struct RawLobbying {
    /// Consolidation date of the disclosure.
    #[serde(rename = "Date", deserialize_with = "de_date")]
    pub date: NaiveDate,
    #[serde(rename = "Ticker")]
    pub ticker: Option<String>,
    #[serde(rename = "Client", default)]
    pub client: Option<String>,
    #[serde(rename = "Issue", default)]
    pub issue: Option<String>,
    #[serde(rename = "SpecificIssue", default)]
    pub specific_issue: Option<String>,
    #[serde(rename = "Amount", default)]
    pub amount: Option<BigDecimal>,
}

/// `yyyy-MM-dd`, tolerating a trailing `THH:MM:SS`.
fn de_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .map_err(|err| D::Error::custom(format!("invalid date {raw:?}: {err}")))
}

// records
// ----------------------------------------------------------------------------

/// A decoded lobbying disclosure, ready to be laid out as csv.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbyingRecord {
    /// Uppercased ticker.
    pub ticker: String,
    /// Date reported by the vendor.
    pub vendor_date: NaiveDate,
    /// One day before `vendor_date`; the vendor date is when the data was consolidated, not
    /// when it applies.
    pub effective_date: NaiveDate,
    pub client: String,
    pub issue: String,
    pub specific_issue: String,
    pub amount: Option<BigDecimal>,
}

impl TryFrom<RawLobbying> for LobbyingRecord {
    type Error = SpiderError;

    fn try_from(raw: RawLobbying) -> Result<Self> {
        let ticker = raw
            .ticker
            .filter(|ticker| !ticker.trim().is_empty())
            .ok_or_else(|| SpiderError::Decode(format!("record dated {} has no ticker", raw.date)))?
            .trim()
            .to_uppercase();

        let effective_date = raw.date.pred_opt().ok_or_else(|| {
            SpiderError::Decode(format!("record for {ticker} has no day before {}", raw.date))
        })?;

        Ok(Self {
            ticker,
            vendor_date: raw.date,
            effective_date,
            client: raw.client.as_deref().map(clean_text).unwrap_or_default(),
            issue: raw.issue.as_deref().map(clean_text).unwrap_or_default(),
            specific_issue: raw
                .specific_issue
                .as_deref()
                .map(clean_text)
                .unwrap_or_default(),
            amount: raw.amount,
        })
    }
}

impl LobbyingRecord {
    /// `client,issue,specificIssue,amount`, shared by ticker and universe lines.
    pub fn row(&self) -> String {
        let amount = self
            .amount
            .as_ref()
            .map(|amount| amount.to_string())
            .unwrap_or_default();
        format!(
            "{},{},{},{amount}",
            self.client, self.issue, self.specific_issue
        )
    }

    /// Effective date as the 8 digit line prefix.
    pub fn effective_date_key(&self) -> String {
        self.effective_date.format(LINE_DATE_FORMAT).to_string()
    }
}

/// Newlines and commas would break the line layout; swap them for spaces and squash the
/// resulting whitespace runs.
pub fn clean_text(text: &str) -> String {
    text.replace(['\r', '\n', ','], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// lines
// ----------------------------------------------------------------------------

/// A ticker file line read back: `YYYYMMDD,client,issue,specificIssue,amount`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbyingRow {
    pub date: NaiveDate,
    pub client: String,
    pub issue: String,
    pub specific_issue: String,
    pub amount: Option<BigDecimal>,
}

/// A universe file line read back: `identifier,ticker,client,issue,specificIssue,amount`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniverseRow {
    pub identifier: String,
    pub ticker: String,
    pub client: String,
    pub issue: String,
    pub specific_issue: String,
    pub amount: Option<BigDecimal>,
}

pub fn parse_ticker_line(line: &str) -> Option<LobbyingRow> {
    let fields: Vec<&str> = line.split(',').collect();
    let [date, client, issue, specific_issue, amount] = fields.as_slice() else {
        return None;
    };
    Some(LobbyingRow {
        date: NaiveDate::parse_from_str(date, LINE_DATE_FORMAT).ok()?,
        client: client.to_string(),
        issue: issue.to_string(),
        specific_issue: specific_issue.to_string(),
        amount: parse_amount(amount)?,
    })
}

pub fn parse_universe_line(line: &str) -> Option<UniverseRow> {
    let fields: Vec<&str> = line.split(',').collect();
    let [identifier, ticker, client, issue, specific_issue, amount] = fields.as_slice() else {
        return None;
    };
    Some(UniverseRow {
        identifier: identifier.to_string(),
        ticker: ticker.to_string(),
        client: client.to_string(),
        issue: issue.to_string(),
        specific_issue: specific_issue.to_string(),
        amount: parse_amount(amount)?,
    })
}

/// `Some(None)` for an empty field, `None` if the field isn't a number.
fn parse_amount(field: &str) -> Option<Option<BigDecimal>> {
    if field.is_empty() {
        return Some(None);
    }
    BigDecimal::from_str(field).ok().map(Some)
}
