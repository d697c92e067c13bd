use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one day of Quiver lobbying data and merge it into the csv files.
    Download {
        /// Processing date (YYYY-MM-DD).
        ///
        /// If no date is provided, yesterday (UTC) is processed.
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Download every day in a date range, one after another.
    Backfill {
        /// First date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        from: NaiveDate,

        /// Last date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        to: NaiveDate,

        #[command(flatten)]
        options: RunOptions,
    },
}

/// Overrides for values otherwise read from the environment (or `.env`).
#[derive(Args, Debug, Default)]
pub struct RunOptions {
    /// Root output folder [env: LOBBY_DESTINATION].
    #[arg(long)]
    pub destination: Option<PathBuf>,

    /// Root of the published data set to merge against [env: LOBBY_PROCESSED].
    #[arg(long)]
    pub processed: Option<PathBuf>,

    /// Reference data folder holding the map files [env: LOBBY_DATA_FOLDER].
    #[arg(long)]
    pub data_folder: Option<PathBuf>,

    /// Quiver API token [env: QUIVER_AUTH_TOKEN].
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_date_is_optional() {
        let cli = Cli::parse_from(["lobby", "download"]);
        assert!(matches!(cli.command, Commands::Download { date: None, .. }));
        assert_eq!(cli.trace, None);

        let cli = Cli::parse_from(["lobby", "download", "--date", "2022-02-15", "-t", "DEBUG"]);
        match cli.command {
            Commands::Download { date, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2022, 2, 15))
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.trace, Some(TraceLevel::DEBUG));
    }

    #[test]
    fn backfill_takes_range_and_overrides() {
        let cli = Cli::parse_from([
            "lobby",
            "backfill",
            "--from",
            "2022-02-01",
            "--to",
            "2022-02-03",
            "--destination",
            "/out",
            "--token",
            "key",
        ]);
        match cli.command {
            Commands::Backfill { from, to, options } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2022, 2, 1).unwrap());
                assert_eq!(to, NaiveDate::from_ymd_opt(2022, 2, 3).unwrap());
                assert_eq!(options.destination, Some(PathBuf::from("/out")));
                assert_eq!(options.token.as_deref(), Some("key"));
                assert_eq!(options.processed, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn malformed_date_is_rejected() {
        assert!(Cli::try_parse_from(["lobby", "download", "--date", "15/02/2022"]).is_err());
    }
}
