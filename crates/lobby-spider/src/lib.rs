pub mod config;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod pipeline;
pub mod quiver;
pub mod rate_limit;
pub mod resolver;
pub(crate) mod tui;

pub use error::{Result, SpiderError};
pub use pipeline::{Pipeline, RunReport, Stage};

/// Shortcut for required API elements.
pub(crate) mod http {
    pub(crate) use dotenv::var;
    pub(crate) use reqwest::Client as HttpClient;
}

/// Human readable elapsed time, for the tail of log lines.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!("time elapsed: {:.3}s", time.elapsed().as_secs_f64())
}
