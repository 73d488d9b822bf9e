//! Wiring of the acquisition and normalization stages.

use std::sync::Arc;

use tracing::info;

use screener_core::{
    BlobStore, CanonicalReportStore, CompanyStore, FilingParser, Period, RawReportStore,
    ReportFileStore, Result,
};
use screener_edgar::{EdgarClient, IndexRunSummary, QuarterlyIndexScraper};
use screener_normalize::{ConsumerSummary, DEFAULT_BATCH_SIZE, ReportConsumer, XbrlFactParser};

/// Owns every collaborator of the two stages.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use screener::{EdgarClient, FsBlobStore, InMemoryStore, Period, Pipeline};
///
/// #[tokio::main]
/// async fn main() -> screener::Result<()> {
///     let client = EdgarClient::new("MyApp/1.0 (contact@example.com)", Duration::from_secs(30))?;
///     let blobs = Arc::new(FsBlobStore::new("/tmp/screener")?);
///     let pipeline = Pipeline::new(client, blobs, Arc::new(InMemoryStore::new()));
///
///     let acquired = pipeline.scrape(Period::new(2020, 1)?).await?;
///     let normalized = pipeline.normalize().await?;
///     println!("{} extracted, {} valid", acquired.extracted, normalized.valid);
///     Ok(())
/// }
/// ```
pub struct Pipeline {
    client: EdgarClient,
    blobs: Arc<dyn BlobStore>,
    companies: Arc<dyn CompanyStore>,
    report_files: Arc<dyn ReportFileStore>,
    raw_reports: Arc<dyn RawReportStore>,
    canonical_reports: Arc<dyn CanonicalReportStore>,
    parser: Arc<dyn FilingParser>,
    batch_size: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("client", &self.client)
            .field("parser", &self.parser)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline persisting everything to `store`.
    #[must_use]
    pub fn new<S>(client: EdgarClient, blobs: Arc<dyn BlobStore>, store: Arc<S>) -> Self
    where
        S: CompanyStore + ReportFileStore + RawReportStore + CanonicalReportStore + 'static,
    {
        Self {
            client,
            blobs,
            companies: store.clone(),
            report_files: store.clone(),
            raw_reports: store.clone(),
            canonical_reports: store,
            parser: Arc::new(XbrlFactParser::new()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create a pipeline backed by a blob directory and a SQLite database.
    ///
    /// # Errors
    /// Returns an error if either store cannot be opened.
    #[cfg(feature = "sqlite")]
    pub fn open(
        client: EdgarClient,
        store_dir: impl AsRef<std::path::Path>,
        database: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        let blobs = Arc::new(screener_store::FsBlobStore::new(store_dir)?);
        let db = Arc::new(screener_store::SqliteStore::new(database)?);
        Ok(Self::new(client, blobs, db))
    }

    /// Use a different filing parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn FilingParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Set the normalization page size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Acquires every new filing listed in a quarter's full index.
    ///
    /// # Errors
    /// Returns an error if the quarterly index cannot be fetched.
    pub async fn scrape(&self, period: Period) -> Result<IndexRunSummary> {
        info!(period = %period, "Starting acquisition");
        let scraper = QuarterlyIndexScraper::new(
            self.client.clone(),
            self.blobs.clone(),
            self.companies.clone(),
            self.report_files.clone(),
        );
        scraper.scrape(period).await
    }

    /// Normalizes every queued report file.
    ///
    /// # Errors
    /// Returns an error if the work queue cannot be read or updated.
    pub async fn normalize(&self) -> Result<ConsumerSummary> {
        info!(batch_size = self.batch_size, "Starting normalization");
        ReportConsumer::new(
            self.report_files.clone(),
            self.raw_reports.clone(),
            self.canonical_reports.clone(),
            self.parser.clone(),
        )
        .with_batch_size(self.batch_size)
        .run()
        .await
    }
}
