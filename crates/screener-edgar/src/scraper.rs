//! Quarterly acquisition run.

use screener_core::{
    BlobStore, ByteStream, Company, CompanyStore, Period, ReportFile, ReportFileStore, Result,
    ScreenerError,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::client::EdgarClient;
use crate::extract::InstanceExtractor;
use crate::index::{IndexParser, IndexRecord};
use crate::key::storage_key;
use crate::package::PackageRetriever;

/// Counters for one quarterly run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexRunSummary {
    /// Well-formed filing rows seen.
    pub records: usize,
    /// Rows without exactly five fields.
    pub malformed: usize,
    /// Lines longer than the line buffer.
    pub overlong: usize,
    /// Rows whose CIK is not an integer.
    pub invalid_cik: usize,
    /// Rows whose document was already stored.
    pub cached: usize,
    /// Packages downloaded.
    pub downloaded: usize,
    /// Instance documents extracted and queued.
    pub extracted: usize,
    /// Rows that failed after CIK validation.
    pub failed: usize,
}

/// Walks one quarter of the full index and acquires every filing not yet stored.
///
/// The index body is streamed through an [`IndexParser`] and each record is
/// processed as soon as its line is complete, so only one line of the index
/// is ever buffered. A failing record is logged and counted and never stops
/// the run.
pub struct QuarterlyIndexScraper {
    client: EdgarClient,
    blobs: Arc<dyn BlobStore>,
    companies: Arc<dyn CompanyStore>,
    retriever: PackageRetriever,
    extractor: InstanceExtractor,
}

impl std::fmt::Debug for QuarterlyIndexScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuarterlyIndexScraper")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl QuarterlyIndexScraper {
    /// Create a scraper from its collaborators.
    #[must_use]
    pub fn new(
        client: EdgarClient,
        blobs: Arc<dyn BlobStore>,
        companies: Arc<dyn CompanyStore>,
        report_files: Arc<dyn ReportFileStore>,
    ) -> Self {
        Self {
            retriever: PackageRetriever::new(client.clone(), blobs.clone()),
            extractor: InstanceExtractor::new(blobs.clone(), report_files),
            client,
            blobs,
            companies,
        }
    }

    /// Runs acquisition for one quarter.
    ///
    /// # Errors
    /// Fails only if the index itself cannot be fetched or read. Per-record
    /// failures are reported through the returned summary.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn scrape(&self, period: Period) -> Result<IndexRunSummary> {
        let url = self.client.index_url(period);
        info!(url = %url, "Getting quarterly index");

        let mut body = self.client.get_stream(&url).await.inspect_err(|e| {
            error!(url = %url, error = %e, "Failed to fetch quarterly index");
        })?;

        let mut summary = IndexRunSummary::default();
        self.process_index(period, &mut body, &mut summary)
            .await
            .inspect_err(|e| {
                error!(url = %url, error = %e, "Failed to read quarterly index");
            })?;

        info!(
            records = summary.records,
            malformed = summary.malformed,
            overlong = summary.overlong,
            invalid_cik = summary.invalid_cik,
            cached = summary.cached,
            downloaded = summary.downloaded,
            extracted = summary.extracted,
            failed = summary.failed,
            "Finished quarterly index"
        );
        Ok(summary)
    }

    /// Parses `body` as a quarterly index and acquires each record as soon as
    /// its line is complete.
    ///
    /// # Errors
    /// Fails if `body` fails. Records completed before that point stay
    /// acquired and counted in `summary`.
    pub async fn process_index(
        &self,
        period: Period,
        body: &mut dyn ByteStream,
        summary: &mut IndexRunSummary,
    ) -> Result<()> {
        let mut parser = IndexParser::new();
        while let Some(chunk) = body.next_chunk().await? {
            for item in parser.feed(&chunk) {
                self.handle_item(period, item, summary).await;
            }
        }
        if let Some(item) = parser.finish() {
            self.handle_item(period, item, summary).await;
        }
        Ok(())
    }

    async fn handle_item(
        &self,
        period: Period,
        item: Result<IndexRecord>,
        summary: &mut IndexRunSummary,
    ) {
        let record = match item {
            Ok(record) => record,
            Err(ScreenerError::LineTooLong { limit }) => {
                error!(limit, "Index line too long, skipping");
                summary.overlong += 1;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed index row");
                summary.malformed += 1;
                return;
            }
        };
        summary.records += 1;

        if let Err(e) = self.process_record(period, &record, summary).await {
            match e {
                ScreenerError::InvalidCik(ref cik) => {
                    warn!(cik = %cik, company = %record.company_name, "Skipping record with invalid CIK");
                    summary.invalid_cik += 1;
                }
                _ => {
                    error!(
                        cik = %record.cik,
                        filename = %record.filename,
                        kind = ?e.kind(),
                        error = %e,
                        "Failed to process filing"
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    async fn process_record(
        &self,
        period: Period,
        record: &IndexRecord,
        summary: &mut IndexRunSummary,
    ) -> Result<()> {
        let cik = record.cik_number()?;

        self.companies
            .insert_update_company(&Company::new(cik, record.company_name.as_str()))
            .await?;

        let key = storage_key(&record.cik, period, &record.form_type);
        if let Some(path) = self.blobs.get_file_path(&key.bucket, &key.key).await? {
            debug!(key = %key, path = %path.display(), "Already stored, skipping");
            summary.cached += 1;
            return Ok(());
        }

        let archive = self.retriever.retrieve(&record.filename, &key.bucket).await?;
        summary.downloaded += 1;

        let stub = ReportFile::new(cik, period, record.form_type.as_str());
        self.extractor.extract(&archive, &key, stub).await?;
        summary.extracted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_store::{FsBlobStore, InMemoryStore};
    use std::io::Write;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;

    const INDEX_PATH: &str = "/Archives/edgar/full-index/2020/QTR1/xbrl.idx";
    const ACME_ZIP_PATH: &str =
        "/Archives/edgar/data/12345/000001234520000012/0000012345-20-000012-xbrl.zip";

    fn index_body(rows: &[&str]) -> String {
        let mut body = String::from(
            "Description:           XBRL Index of EDGAR Dissemination Feed\n\
             CIK|Company Name|Form Type|Date Filed|Filename\n\
             --------------------------------------------------------------------------------\n",
        );
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        body
    }

    fn package_bytes() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("FilingSummary.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"summary").unwrap();
        writer
            .start_file("acme-20191231.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<xbrl/>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    struct Harness {
        _dir: tempfile::TempDir,
        blobs: Arc<FsBlobStore>,
        db: Arc<InMemoryStore>,
        scraper: QuarterlyIndexScraper,
    }

    fn harness(server: &MockServer) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(FsBlobStore::new(dir.path()).unwrap());
        let db = Arc::new(InMemoryStore::new());
        let client = EdgarClient::new("Test/1.0 (test@example.com)", Duration::from_secs(5))
            .unwrap()
            .with_rate_limit(Duration::ZERO)
            .with_archive_root(format!("{}/Archives/", server.uri()));
        let scraper = QuarterlyIndexScraper::new(client, blobs.clone(), db.clone(), db.clone());
        Harness {
            _dir: dir,
            blobs,
            db,
            scraper,
        }
    }

    fn period() -> Period {
        Period::new(2020, 1).unwrap()
    }

    #[tokio::test]
    async fn test_acme_filing_is_acquired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_body(&[
                "0000012345|Acme Corp|10-K|2020-03-01|edgar/data/12345/0000012345-20-000012.txt",
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ACME_ZIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package_bytes()))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server);
        let summary = h.scraper.scrape(period()).await.unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(h.db.companies().await, vec![Company::new(12345, "Acme Corp")]);

        let files = h.db.report_files().await;
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!((file.cik, file.year, file.quarter), (12345, 2020, 1));
        assert_eq!(file.form_type, "10-K");
        assert!(!file.parsed);
        assert!(!file.filepath.is_empty());

        let stored = h
            .blobs
            .get_file_path("CIK_0000012345", "Y2020Q1FT10-K")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.to_string_lossy(), file.filepath);
    }

    #[tokio::test]
    async fn test_cached_key_skips_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_body(&[
                "0000012345|Acme Corp|10-K|2020-03-01|edgar/data/12345/0000012345-20-000012.txt",
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ACME_ZIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package_bytes()))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server);
        h.blobs
            .store_bytes("CIK_0000012345", "Y2020Q1FT10-K", b"<xbrl/>")
            .await
            .unwrap();

        let summary = h.scraper.scrape(period()).await.unwrap();
        assert_eq!(summary.cached, 1);
        assert_eq!(summary.downloaded, 0);
        assert!(h.db.report_files().await.is_empty());
        assert_eq!(h.db.companies().await.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_rows_do_not_stop_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_body(&[
                "notanumber|Broken Co|10-K|2020-01-01|edgar/data/1/0000000001-20-000001.txt",
                "2|Too|Few",
                "3|Html Co|10-Q|2020-01-02|edgar/data/3/0000000003-20-000001.htm",
                "0000012345|Acme Corp|10-K|2020-03-01|edgar/data/12345/0000012345-20-000012.txt",
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ACME_ZIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package_bytes()))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server);
        let summary = h.scraper.scrape(period()).await.unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.invalid_cik, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.extracted, 1);

        let ciks: Vec<i64> = h.db.companies().await.iter().map(|c| c.cik).collect();
        assert_eq!(ciks, vec![3, 12345]);
        let files = h.db.report_files().await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].cik, 12345);
    }

    #[tokio::test]
    async fn test_missing_package_is_isolated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_body(&[
                "7|Gone Inc|10-Q|2020-02-01|edgar/data/7/0000000007-20-000001.txt",
                "0000012345|Acme Corp|10-K|2020-03-01|edgar/data/12345/0000012345-20-000012.txt",
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ACME_ZIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package_bytes()))
            .mount(&server)
            .await;

        let h = harness(&server);
        let summary = h.scraper.scrape(period()).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.extracted, 1);
    }

    /// Index body served in fixed chunks that notes how far acquisition had
    /// got each time the next chunk was pulled.
    struct ObservedIndex {
        chunks: Vec<String>,
        fail_at_end: bool,
        db: Arc<InMemoryStore>,
        progress: Vec<(usize, usize)>,
    }

    impl ObservedIndex {
        fn new(chunks: Vec<String>, fail_at_end: bool, db: Arc<InMemoryStore>) -> Self {
            Self {
                chunks: chunks.into_iter().rev().collect(),
                fail_at_end,
                db,
                progress: Vec::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ByteStream for ObservedIndex {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
            let companies = self.db.companies().await.len();
            let report_files = self.db.report_files().await.len();
            self.progress.push((companies, report_files));
            match self.chunks.pop() {
                Some(chunk) => Ok(Some(chunk.into_bytes())),
                None if self.fail_at_end => {
                    Err(ScreenerError::Network("connection reset".to_string()))
                }
                None => Ok(None),
            }
        }
    }

    fn acme_then_widget() -> Vec<String> {
        vec![
            index_body(&[
                "0000012345|Acme Corp|10-K|2020-03-01|edgar/data/12345/0000012345-20-000012.txt",
            ]),
            "0000067890|Widget Holdings|8-K|2020-03-02|edgar/data/67890/0000067890-20-000003.txt\n"
                .to_string(),
        ]
    }

    #[tokio::test]
    async fn test_records_are_acquired_while_index_streams() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ACME_ZIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package_bytes()))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server);
        let mut body = ObservedIndex::new(acme_then_widget(), false, h.db.clone());
        let mut summary = IndexRunSummary::default();
        h.scraper
            .process_index(period(), &mut body, &mut summary)
            .await
            .unwrap();

        // Acme was downloaded and queued before the Widget line was read.
        assert_eq!(body.progress, vec![(0, 0), (1, 1), (2, 1)]);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_broken_index_keeps_earlier_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ACME_ZIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package_bytes()))
            .mount(&server)
            .await;

        let h = harness(&server);
        let mut body = ObservedIndex::new(acme_then_widget()[..1].to_vec(), true, h.db.clone());
        let mut summary = IndexRunSummary::default();
        let err = h
            .scraper
            .process_index(period(), &mut body, &mut summary)
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenerError::Network(_)));
        assert_eq!(summary.extracted, 1);
        assert_eq!(h.db.report_files().await.len(), 1);
    }

    #[tokio::test]
    async fn test_index_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INDEX_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let h = harness(&server);
        let err = h.scraper.scrape(period()).await.unwrap_err();
        assert!(matches!(err, ScreenerError::HttpStatus { status: 503, .. }));
    }
}
