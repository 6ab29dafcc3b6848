//! Bounded-concurrency media downloads with single-retry and completion
//! tracking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filetime::FileTime;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::feed::MediaItem;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("media request failed")]
    Request(#[source] reqwest::Error),
    #[error("media endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download task panicked")]
    TaskPanicked,
}

/// One unit of download work: one media item, one destination file.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub item: MediaItem,
    pub url: String,
    pub filename: String,
    pub dest_dir: PathBuf,
}

/// How a successful job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Downloaded,
    /// The destination file already existed; no network call was made.
    AlreadyPresent,
}

/// Terminal state of one job, paired with its originating item.
#[derive(Debug)]
pub struct JobOutcome {
    pub item: MediaItem,
    pub status: Result<JobStatus, DownloadError>,
}

/// Fixed-width pool of download workers.
///
/// `submit` never blocks: each job runs on its own tokio task, gated by a
/// semaphore permit so at most `width` downloads touch the network at once.
/// Failures stay inside their job; other jobs are unaffected.
pub struct DownloadPool {
    client: Client,
    semaphore: Arc<Semaphore>,
    backoff: Duration,
    in_flight: FuturesUnordered<BoxFuture<'static, JobOutcome>>,
}

impl DownloadPool {
    /// # Panics
    ///
    /// Panics if `width` is zero; `Config::validate` rules that out for
    /// configured values.
    #[must_use]
    pub fn new(client: Client, width: usize, backoff: Duration) -> Self {
        assert!(width > 0, "worker pool width must be at least 1");
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(width)),
            backoff,
            in_flight: FuturesUnordered::new(),
        }
    }

    /// Queue one job and return immediately. The job starts as soon as a
    /// permit frees up, independently of the caller's control flow.
    pub fn submit(&self, job: DownloadJob) {
        let client = self.client.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let backoff = self.backoff;
        let item = job.item.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("download semaphore closed");
            let status = run_job(&client, &job, backoff).await;
            JobOutcome {
                item: job.item,
                status,
            }
        });

        self.in_flight.push(Box::pin(async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(_) => JobOutcome {
                    item,
                    status: Err(DownloadError::TaskPanicked),
                },
            }
        }));
    }

    #[must_use]
    pub fn submitted(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every submitted job to settle.
    ///
    /// Yields exactly one outcome per job, in completion order (not
    /// submission order). One-shot: consumes the pool.
    pub async fn await_all(self) -> Vec<JobOutcome> {
        let mut in_flight = self.in_flight;
        let mut outcomes = Vec::with_capacity(in_flight.len());
        while let Some(outcome) = in_flight.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn run_job(
    client: &Client,
    job: &DownloadJob,
    backoff: Duration,
) -> Result<JobStatus, DownloadError> {
    let path = job.dest_dir.join(&job.filename);

    // Once a file is present it is never re-fetched or overwritten.
    if matches!(tokio::fs::try_exists(&path).await, Ok(true)) {
        debug!(item = %job.item.id, path = %path.display(), "File already present, skipping");
        return Ok(JobStatus::AlreadyPresent);
    }

    let response = fetch_with_retry(client, &job.url, backoff).await?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    write_body(response, &path).await?;

    let stamp = FileTime::from_unix_time(job.item.created_time, 0);
    filetime::set_file_times(&path, stamp, stamp).map_err(|source| DownloadError::Write {
        path: path.clone(),
        source,
    })?;

    debug!(item = %job.item.id, path = %path.display(), "Downloaded");
    Ok(JobStatus::Downloaded)
}

/// The first attempt rides the shared session client; a connection-level
/// failure gets exactly one more attempt on a fresh session-less client
/// after a fixed backoff. A failed retry is terminal.
async fn fetch_with_retry(
    client: &Client,
    url: &str,
    backoff: Duration,
) -> Result<reqwest::Response, DownloadError> {
    match client.get(url).send().await {
        Ok(response) => Ok(response),
        Err(first) => {
            debug!(url, "Request failed ({first}), retrying once without session");
            tokio::time::sleep(backoff).await;

            let bare = Client::builder().build().map_err(DownloadError::Request)?;
            bare.get(url).send().await.map_err(DownloadError::Request)
        }
    }
}

/// Stream the response body to `path`. The file handle closes on every exit
/// path; a partial file left by a mid-stream failure is not cleaned up.
async fn write_body(response: reqwest::Response, path: &Path) -> Result<(), DownloadError> {
    let write_err = |source| DownloadError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(write_err)?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DownloadError::Request)?;
        file.write_all(&chunk).await.map_err(write_err)?;
    }
    file.flush().await.map_err(write_err)
}
