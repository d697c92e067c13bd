use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Banner printed above each stage when running without tracing.
pub(crate) fn banner(name: &str) {
    println!("{bar}\n{name:^40}\n{bar}", bar = "=".repeat(40));
}

/// Bar over the files of the merge step; hidden unless `tui`.
pub(crate) fn merge_progress(len: usize, tui: bool) -> ProgressBar {
    if !tui {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::default_bar()
        .template(
            "{msg} {spinner:.magenta}\n\
            [{elapsed_precise:.magenta}] |{bar:40.cyan/blue}| {human_pos}/{human_len} files \
            [Rate: {per_sec:.magenta}, ETA: {eta:.blue}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    let pb = ProgressBar::new(len as u64).with_style(style);
    pb.set_message("merging files ...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
