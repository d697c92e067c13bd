use chrono::NaiveDate;

/// Lobbying disclosures: the wire format, the decoded records and the csv line layout.
pub mod lobbying;

/// Grouping of decoded records into per-ticker and universe lines.
pub mod partition;

/// [Quiver Quantitative API](https://api.quiverquant.com/docs/) base url.
pub const BASE_URL: &str = "https://api.quiverquant.com/beta/";

pub const VENDOR_NAME: &str = "quiver";

pub const VENDOR_DATA_NAME: &str = "lobbying";

/// Url for one day of lobbying disclosures; `date_from` and `date_to` are both the
/// processing date.
pub fn lobbying_url(base_url: &str, date: NaiveDate) -> String {
    format!(
        "{base}/live/lobbying?date_from={date}&date_to={date}",
        base = base_url.trim_end_matches('/'),
        date = date.format("%Y%m%d")
    )
}
