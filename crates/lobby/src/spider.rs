use crate::cli::RunOptions;
use chrono::{Duration, NaiveDate, Utc};
use lobby_spider::config::Config;
use lobby_spider::Pipeline;
use tracing::{debug, error, info, trace, warn};

/// Environment config with the command line overrides applied.
pub(crate) fn config(options: RunOptions) -> anyhow::Result<Config> {
    let mut config = Config::from_env(options.token).map_err(|err| {
        error!("failed to read configuration, error({err})");
        err
    })?;

    if let Some(destination) = options.destination {
        config.destination = destination;
    }
    if let Some(processed) = options.processed {
        config.processed = Some(processed);
    }
    if let Some(data_folder) = options.data_folder {
        config.data_folder = data_folder;
    }

    debug!("configuration: {:?}", config.redacted());
    Ok(config)
}

/// Yesterday, UTC.
pub(crate) fn default_date() -> NaiveDate {
    Utc::now().date_naive() - Duration::days(1)
}

/// Every date in `[from, to]`, ascending.
pub(crate) fn date_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|date| *date <= to).collect()
}

/// Run the pipeline over `dates`, one after another.
///
/// Fails only if no date succeeded.
pub(crate) async fn run(config: &Config, dates: Vec<NaiveDate>, tui: bool) -> anyhow::Result<()> {
    if dates.is_empty() {
        anyhow::bail!("no dates to process");
    }

    trace!("building lobbying pipeline ...");
    let mut pipeline = Pipeline::from_config(config)
        .map_err(|err| {
            error!("failed to build lobbying pipeline, error({err})");
            err
        })?
        .with_tui(tui);

    let time = std::time::Instant::now();
    let mut failed = Vec::new();
    for date in &dates {
        if !pipeline.run(*date).await {
            failed.push(*date);
        }
    }

    info!(
        "lobbying spider finished {} of {} dates, time elapsed: {:?}",
        dates.len() - failed.len(),
        dates.len(),
        time.elapsed()
    );

    if failed.len() == dates.len() {
        anyhow::bail!("lobbying download failed for every requested date");
    }
    if !failed.is_empty() {
        warn!("dates without output: {failed:?}");
        if tui {
            println!("dates without output: {failed:?}");
        }
    }

    Ok(())
}
