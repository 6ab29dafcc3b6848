//! Batch orchestration: one session and one CSV sink shared across every
//! account in the run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::download::{DownloadJob, DownloadPool, JobStatus};
use crate::extract;
use crate::feed::{FeedError, MediaFeed};
use crate::session::Session;
use crate::sink::{CsvSink, SinkError};

#[derive(Debug, Error)]
enum ScrapeError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("failed to create destination directory {path}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counters reported after a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub accounts_scraped: usize,
    pub accounts_unavailable: usize,
    pub rows_written: usize,
    pub downloads_completed: usize,
    pub downloads_skipped: usize,
    pub downloads_failed: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct AccountStats {
    rows: usize,
    completed: usize,
    skipped: usize,
    failed: usize,
}

/// Scrape every account in `accounts`.
///
/// An unavailable account (private or nonexistent) is logged and skipped so
/// it cannot block the rest of the batch; any other failure aborts the run.
/// The session is logged out and the sink closed before returning.
///
/// # Errors
///
/// Login failures, sink creation/write failures and transport errors
/// propagate.
pub async fn run_batch(config: &Config, accounts: &[String]) -> Result<BatchSummary> {
    let session = Session::new(config).context("Failed to build HTTP session")?;

    if let Some(credentials) = &config.credentials {
        session
            .login(&credentials.username, &credentials.password)
            .await
            .context("Login failed")?;
        info!(user = %credentials.username, "Authenticated session established");
    }

    let mut sink = CsvSink::create(&config.output_path).with_context(|| {
        format!(
            "Failed to open results file {}",
            config.output_path.display()
        )
    })?;

    let mut summary = BatchSummary::default();

    for account in accounts {
        match scrape_account(config, &session, &mut sink, account).await {
            Ok(stats) => {
                summary.accounts_scraped += 1;
                summary.rows_written += stats.rows;
                summary.downloads_completed += stats.completed;
                summary.downloads_skipped += stats.skipped;
                summary.downloads_failed += stats.failed;
                info!(
                    account = %account,
                    items = stats.rows,
                    downloaded = stats.completed,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Account scraped"
                );
            }
            Err(ScrapeError::Feed(e)) if e.is_account_unavailable() => {
                warn!(account = %account, "Account unavailable: {e}");
                summary.accounts_unavailable += 1;
            }
            Err(e) => {
                session.logout().await;
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("Scraping {account} failed"));
            }
        }
    }

    session.logout().await;
    sink.finish().context("Failed to close results file")?;

    Ok(summary)
}

/// Drain one account's feed: write each item's metadata row, submit its
/// download, then wait for every submitted job to settle.
async fn scrape_account(
    config: &Config,
    session: &Session,
    sink: &mut CsvSink,
    account: &str,
) -> Result<AccountStats, ScrapeError> {
    let dest_dir = config.destination_root.join(account);
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .map_err(|source| ScrapeError::Destination {
            path: dest_dir.clone(),
            source,
        })?;

    let pool = DownloadPool::new(
        session.client().clone(),
        config.worker_concurrency,
        config.retry_backoff,
    );
    let mut feed = MediaFeed::new(session, account);
    let mut stats = AccountStats::default();
    let now = Utc::now().timestamp();

    while let Some(items) = feed.next_page().await? {
        for item in items {
            let record = match extract::extract(&item, account, now) {
                Ok(record) => record,
                Err(e) => {
                    warn!(account, item = %item.id, "Skipping malformed item: {e}");
                    continue;
                }
            };

            // The metadata row lands before the download is queued.
            sink.write(&record)?;
            stats.rows += 1;

            pool.submit(DownloadJob {
                url: record.url,
                filename: record.img,
                dest_dir: dest_dir.clone(),
                item,
            });
        }
    }

    info!(account, jobs = pool.submitted(), "Feed drained, waiting for downloads");

    for outcome in pool.await_all().await {
        match outcome.status {
            Ok(JobStatus::Downloaded) => stats.completed += 1,
            Ok(JobStatus::AlreadyPresent) => stats.skipped += 1,
            Err(error) => {
                stats.failed += 1;
                let error = anyhow::Error::new(error);
                warn!(account, item = %outcome.item.id, "Download failed: {error:#}");
            }
        }
    }

    Ok(stats)
}
