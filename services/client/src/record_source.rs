//! Bet records read from a headerless CSV file
//!
//! Rows are parsed lazily, one per `next()` call. Under the `Abort` policy a
//! file is checked in full when it is opened, so a bad row is reported before
//! any bet leaves the client.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};
use shared::BetRecord;
use tracing::warn;

use crate::errors::{ClientError, Result};

/// What to do with a row that does not form a valid bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidRecordPolicy {
    /// Log the row and keep going
    Skip,
    /// Stop the delivery with an error
    #[default]
    Abort,
}

impl InvalidRecordPolicy {
    pub fn from_skip_flag(skip: bool) -> Self {
        if skip {
            InvalidRecordPolicy::Skip
        } else {
            InvalidRecordPolicy::Abort
        }
    }
}

pub struct CsvRecordSource<R> {
    rows: StringRecordsIntoIter<R>,
    path: String,
    client_id: String,
    policy: InvalidRecordPolicy,
    skipped: usize,
    failed: bool,
}

impl CsvRecordSource<File> {
    /// Open `path` for reading.
    ///
    /// With `Abort`, every row is validated up front and the first invalid one
    /// is returned as the error; the source itself still parses lazily.
    pub fn open(
        path: impl AsRef<Path>,
        client_id: impl Into<String>,
        policy: InvalidRecordPolicy,
    ) -> Result<Self> {
        let path = path.as_ref();
        let client_id = client_id.into();

        if policy == InvalidRecordPolicy::Abort {
            let check = Self::with_rows(open_rows(path)?, path, client_id.clone(), policy);
            for row in check {
                row?;
            }
        }

        Ok(Self::with_rows(open_rows(path)?, path, client_id, policy))
    }

    fn with_rows(
        rows: StringRecordsIntoIter<File>,
        path: &Path,
        client_id: String,
        policy: InvalidRecordPolicy,
    ) -> Self {
        Self {
            rows,
            path: path.display().to_string(),
            client_id,
            policy,
            skipped: 0,
            failed: false,
        }
    }
}

fn open_rows(path: &Path) -> Result<StringRecordsIntoIter<File>> {
    let reader = builder()
        .from_path(path)
        .map_err(|source| ClientError::RecordSource {
            path: path.display().to_string(),
            source,
        })?;
    Ok(reader.into_records())
}

impl<R: Read> CsvRecordSource<R> {
    pub fn from_reader(reader: R, client_id: impl Into<String>, policy: InvalidRecordPolicy) -> Self {
        Self {
            rows: builder().from_reader(reader).into_records(),
            path: "<reader>".to_string(),
            client_id: client_id.into(),
            policy,
            skipped: 0,
            failed: false,
        }
    }

    /// Rows dropped under the `Skip` policy so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).trim(Trim::All);
    builder
}

impl<R: Read> Iterator for CsvRecordSource<R> {
    type Item = Result<BetRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(source) => {
                    self.failed = true;
                    return Some(Err(ClientError::RecordSource {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };

            let line = row.position().map(|p| p.line()).unwrap_or_default();
            let columns: Vec<&str> = row.iter().collect();

            match BetRecord::from_columns(&self.client_id, &columns) {
                Ok(record) => return Some(Ok(record)),
                Err(source) => match self.policy {
                    InvalidRecordPolicy::Skip => {
                        self.skipped += 1;
                        metrics::counter!("invalid_rows_skipped_total").increment(1);
                        warn!(path = %self.path, line, error = %source, "Skipping invalid bet row");
                    }
                    InvalidRecordPolicy::Abort => {
                        self.failed = true;
                        return Some(Err(ClientError::InvalidRow { line, source }));
                    }
                },
            }
        }
    }
}
