//! Fetch command - download several URLs as one group.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use fetchkit::cache::cache_file_name;
use fetchkit::config::{format_size, ConfigFile};
use fetchkit::download::Download;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Notify;
use tracing::debug;

use super::common;
use crate::error::CliError;

/// Progress bar resolution; group progress is a fraction in [0, 1].
const BAR_STEPS: u64 = 1000;

/// Run the fetch command.
pub fn run(urls: &[String], headers: &[String], out_dir: Option<PathBuf>) -> Result<(), CliError> {
    if urls.is_empty() {
        return Err(CliError::InvalidArgument("no URLs given".to_string()));
    }
    let headers = common::parse_headers(headers)?;
    let config = ConfigFile::load()?;
    let runtime = common::runtime()?;

    let downloads = runtime.block_on(async {
        let manager = common::download_manager(&config)?;
        let group = manager.create_group();

        let bar = ProgressBar::new(BAR_STEPS);
        let template = "{spinner} [{bar:40.cyan/blue}] {percent:>3}% {msg}";
        if let Ok(bar_style) = ProgressStyle::with_template(template) {
            bar.set_style(bar_style.progress_chars("##-"));
        }

        let progress_bar = bar.clone();
        group.on_progress(move |bytes, progress| {
            progress_bar.set_position((progress * BAR_STEPS as f64).round() as u64);
            progress_bar.set_message(format_size(bytes));
        });

        for url in urls {
            group.download(url, headers.clone());
        }
        debug!(count = group.len(), "Group downloads started");

        // Only after every member is added; fires at once if all are done
        let done = Arc::new(Notify::new());
        let notify = Arc::clone(&done);
        group.on_complete(move |_| notify.notify_one());
        done.notified().await;
        bar.finish_and_clear();

        Ok::<_, CliError>(group.downloads())
    })?;

    let mut failed = 0;
    for download in &downloads {
        match download.error() {
            Some(error) => {
                failed += 1;
                println!("{} {} ({})", style("FAIL").red().bold(), download.url(), error);
            }
            None => {
                println!(
                    "{} {} ({})",
                    style(" OK ").green().bold(),
                    download.url(),
                    format_size(download.bytes_downloaded())
                );
                if let Some(dir) = &out_dir {
                    save_body(download, dir)?;
                }
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Download(format!(
            "{} of {} downloads failed",
            failed,
            downloads.len()
        )));
    }
    Ok(())
}

/// Write a completed download's body to `dir`, named by the last path
/// segment of its URL, or by its cache file name when there is none.
fn save_body(download: &Download, dir: &Path) -> Result<(), CliError> {
    let Some(response) = download.response() else {
        return Ok(());
    };
    fs::create_dir_all(dir).map_err(|e| CliError::io(dir, e))?;

    let path = dir.join(file_name_for(download.url()));
    fs::write(&path, &response.body).map_err(|e| CliError::io(&path, e))?;
    println!("     saved to {}", path.display());
    Ok(())
}

fn file_name_for(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    match after_scheme.split_once('/') {
        Some((_, rest)) => match rest.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => cache_file_name(url),
        },
        None => cache_file_name(url),
    }
}
