//! Storage and persistence traits.
//!
//! This module defines the collaborators the acquisition pipeline and the
//! normalization engine write through:
//!
//! - [`ByteStream`] - incremental byte source written into a [`BlobStore`]
//! - [`BlobStore`] - bucketed file storage for archives and instance documents
//! - [`CompanyStore`] - company upserts
//! - [`ReportFileStore`] - the report-file work queue
//! - [`RawReportStore`] - raw fact mappings keyed by `(cik, year, quarter)`
//! - [`CanonicalReportStore`] - normalized reports

use async_trait::async_trait;
use std::path::PathBuf;

use crate::{
    error::Result,
    period::Period,
    types::{CanonicalFinancialReport, Company, RawFinancialReport, ReportFile},
};

/// Source of bytes read one chunk at a time.
#[async_trait]
pub trait ByteStream: Send {
    /// Returns the next chunk, or `None` once the stream is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// A [`ByteStream`] over bytes already in memory, yielded as one chunk.
#[derive(Debug, Default)]
pub struct BufferStream(Option<Vec<u8>>);

impl BufferStream {
    /// Create a stream over `bytes`.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Some(bytes.into()))
    }
}

#[async_trait]
impl ByteStream for BufferStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.0.take().filter(|bytes| !bytes.is_empty()))
    }
}

/// Bucketed file storage.
///
/// A bucket partitions files per company; names within a bucket are either
/// derived keys (extracted documents) or unique download names (archives).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the path stored under `key` in `bucket`.
    ///
    /// Returns `Ok(None)` if nothing, or only an empty file, is stored there.
    async fn get_file_path(&self, bucket: &str, key: &str) -> Result<Option<PathBuf>>;

    /// Drains `body` into `name` in `bucket`, replacing any previous file,
    /// and returns the resulting path.
    ///
    /// A stream that fails part way leaves no file behind under `name`.
    async fn store_file(
        &self,
        bucket: &str,
        name: &str,
        body: &mut dyn ByteStream,
    ) -> Result<PathBuf>;

    /// Stores an in-memory buffer under `name` in `bucket`.
    async fn store_bytes(&self, bucket: &str, name: &str, contents: &[u8]) -> Result<PathBuf> {
        self.store_file(bucket, name, &mut BufferStream::new(contents))
            .await
    }
}

/// Persistence for companies.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Inserts a company or updates its name.
    async fn insert_update_company(&self, company: &Company) -> Result<()>;

    /// Retrieves a company by CIK.
    async fn get_company(&self, cik: i64) -> Result<Option<Company>>;
}

/// Persistence for report files, doubling as the normalization work queue.
#[async_trait]
pub trait ReportFileStore: Send + Sync {
    /// Inserts a report file or replaces the one with the same
    /// `(cik, year, quarter, form_type)`.
    async fn insert_update_report_file(&self, report_file: &ReportFile) -> Result<()>;

    /// Returns up to `limit` unparsed report files ordered by
    /// `(cik, year, quarter, form_type)`.
    async fn next_unparsed_files(&self, limit: usize) -> Result<Vec<ReportFile>>;
}

/// Persistence for raw fact mappings.
#[async_trait]
pub trait RawReportStore: Send + Sync {
    /// Retrieves the raw report for a company and period.
    ///
    /// Returns `Ok(None)` if no report was stored.
    async fn get_raw_report(&self, cik: i64, period: Period) -> Result<Option<RawFinancialReport>>;

    /// Stores a raw report, replacing any previous report for the same period.
    async fn put_raw_report(&self, report: &RawFinancialReport) -> Result<()>;
}

/// Persistence for normalized reports.
#[async_trait]
pub trait CanonicalReportStore: Send + Sync {
    /// Retrieves the canonical report for a company and period.
    async fn get_canonical_report(
        &self,
        cik: i64,
        period: Period,
    ) -> Result<Option<CanonicalFinancialReport>>;

    /// Stores a canonical report, replacing any previous report for the same period.
    async fn put_canonical_report(&self, report: &CanonicalFinancialReport) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_stream_yields_once() {
        let mut stream = BufferStream::new(b"<xbrl/>".to_vec());
        assert_eq!(stream.next_chunk().await.unwrap(), Some(b"<xbrl/>".to_vec()));
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_buffer_stream() {
        let mut stream = BufferStream::new(Vec::new());
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }
}
