//! Tabular CSV output: one open handle per batch run, written only from the
//! orchestrating task.

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::extract::MediaRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create results file {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write results row")]
    Write(#[from] csv::Error),
    #[error("failed to flush results file")]
    Flush(#[source] std::io::Error),
}

const HEADER: [&str; 6] = ["Account", "Likes", "Posted", "URL", "Img", "Hashtags"];

/// CSV sink for scraped metadata.
pub struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Create the file and write the header row eagerly, so even an empty
    /// run leaves a well-formed file behind.
    ///
    /// # Errors
    ///
    /// Propagates filesystem and CSV errors; creation failure is fatal for
    /// the batch.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|source| SinkError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush().map_err(SinkError::Flush)?;

        Ok(Self { writer })
    }

    /// Append one row and flush it, so rows written so far survive a later
    /// abort.
    ///
    /// # Errors
    ///
    /// Propagates CSV serialization and I/O errors.
    pub fn write(&mut self, record: &MediaRecord) -> Result<(), SinkError> {
        self.writer.serialize(record)?;
        self.writer.flush().map_err(SinkError::Flush)
    }

    /// Flush and close the sink.
    ///
    /// # Errors
    ///
    /// Propagates the final flush error.
    pub fn finish(mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(SinkError::Flush)
    }
}
