//! Pipeline orchestrator
//!
//! Streams a log source line by line through parse and classify, buffers the
//! results, and flushes the aggregates into the store whenever the buffer
//! hits its record ceiling. A malformed line is warned about and counted,
//! never fatal; an I/O or store error terminates the run.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::core::config::Project;
use crate::data::StoreError;
use crate::domain::ingest::{Batch, BatchAggregates, FlushCounts, PathClassifier, parse_line};

/// Magic bytes that open a gzip stream
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Log read failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Totals for one pipeline run
///
/// Blank lines are skipped before counting, so `lines_read` is always
/// `parsed + rejected`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub lines_read: u64,
    pub parsed: u64,
    pub rejected: u64,
    /// Rows merged per axis, summed over every flush of the run
    pub merged: FlushCounts,
}

/// Streaming parse/classify/aggregate/merge over one log source
pub struct LogPipeline {
    classifier: PathClassifier,
    batch: Batch,
    aggregates: BatchAggregates,
    report: IngestReport,
}

impl LogPipeline {
    pub fn new(project: Project, max_records: usize) -> Self {
        Self {
            classifier: PathClassifier::new(project),
            batch: Batch::with_capacity(max_records),
            aggregates: BatchAggregates::new(),
            report: IngestReport::default(),
        }
    }

    /// Consume a reader to exhaustion and merge everything into the store
    pub async fn run(
        mut self,
        pool: &SqlitePool,
        mut reader: impl BufRead,
    ) -> Result<IngestReport, IngestError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            // Lossy decode: a stray invalid byte should cost one rejected
            // line, not the whole file
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            self.report.lines_read += 1;
            self.ingest_line(pool, line).await?;
        }

        self.flush(pool).await?;
        Ok(self.report)
    }

    async fn ingest_line(&mut self, pool: &SqlitePool, line: &str) -> Result<(), IngestError> {
        let record = match parse_line(line) {
            Ok(record) => record,
            Err(e) => {
                self.report.rejected += 1;
                tracing::warn!(line = %e.preview, "Skipping unparseable log line");
                return Ok(());
            }
        };

        self.report.parsed += 1;
        if self.batch.push(self.classifier.classify(record)) {
            self.flush(pool).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, pool: &SqlitePool) -> Result<(), IngestError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let records = self.batch.take();
        tracing::debug!(records = records.len(), "Flushing batch");
        self.aggregates.observe_all(&records);
        let counts = self.aggregates.flush(pool).await?;
        self.report.merged.accumulate(&counts);
        Ok(())
    }
}

/// Wrap a reader, transparently decoding gzip when the magic bytes lead.
///
/// Rotated logs may concatenate several gzip members; `MultiGzDecoder` reads
/// through all of them.
fn maybe_gzip(mut reader: impl BufRead + 'static) -> io::Result<Box<dyn BufRead>> {
    let head = reader.fill_buf()?;
    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Open a log file as a line reader, plain text or gzip
pub fn open_log_file(path: &Path) -> io::Result<Box<dyn BufRead>> {
    maybe_gzip(BufReader::new(File::open(path)?))
}

/// Standard input as a line reader, plain text or gzip
pub fn stdin_reader() -> io::Result<Box<dyn BufRead>> {
    maybe_gzip(io::stdin().lock())
}
