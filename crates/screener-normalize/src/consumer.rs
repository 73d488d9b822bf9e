//! Batch consumer of the report-file work queue.

use screener_core::{
    CanonicalReportStore, FilingParser, RawReportStore, ReportFile, ReportFileStore, Result,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::NormalizationEngine;

/// Default number of report files fetched per page.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Totals for one consumer run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    /// Pages fetched from the queue.
    pub batches: usize,
    /// Reports saved as valid canonical reports.
    pub valid: usize,
    /// Reports that failed to parse or validate.
    pub invalid: usize,
    /// Files that are not 10-K or 10-Q filings.
    pub skipped: usize,
}

/// What happened to a single report file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Valid,
    Invalid,
    Skipped,
}

/// Returns true for annual and quarterly reports, including amendments.
#[must_use]
pub fn is_periodic_report(form_type: &str) -> bool {
    form_type.starts_with("10-K") || form_type.starts_with("10-Q")
}

/// Drains unparsed report files, normalizing each one.
///
/// Every file taken from the queue is marked parsed, whatever its outcome, so
/// the loop always terminates.
pub struct ReportConsumer {
    report_files: Arc<dyn ReportFileStore>,
    raw_reports: Arc<dyn RawReportStore>,
    canonical_reports: Arc<dyn CanonicalReportStore>,
    parser: Arc<dyn FilingParser>,
    engine: NormalizationEngine,
    batch_size: usize,
}

impl std::fmt::Debug for ReportConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportConsumer")
            .field("parser", &self.parser)
            .field("engine", &self.engine)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl ReportConsumer {
    /// Create a consumer with the default batch size.
    #[must_use]
    pub fn new(
        report_files: Arc<dyn ReportFileStore>,
        raw_reports: Arc<dyn RawReportStore>,
        canonical_reports: Arc<dyn CanonicalReportStore>,
        parser: Arc<dyn FilingParser>,
    ) -> Self {
        Self {
            engine: NormalizationEngine::new(raw_reports.clone()),
            report_files,
            raw_reports,
            canonical_reports,
            parser,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the page size. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Replace the normalization engine.
    #[must_use]
    pub fn with_engine(mut self, engine: NormalizationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Processes pages until the queue is empty.
    ///
    /// # Errors
    /// Returns a store error if a page cannot be fetched or a report file
    /// cannot be marked parsed. Per-file parse and save failures are counted
    /// as invalid instead.
    pub async fn run(&self) -> Result<ConsumerSummary> {
        let mut summary = ConsumerSummary::default();

        loop {
            let batch = self.report_files.next_unparsed_files(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            summary.batches += 1;

            let (mut valid, mut invalid) = (0, 0);
            for report_file in batch {
                match self.process(report_file).await? {
                    Outcome::Valid => valid += 1,
                    Outcome::Invalid => invalid += 1,
                    Outcome::Skipped => summary.skipped += 1,
                }
            }
            summary.valid += valid;
            summary.invalid += invalid;

            info!(valid, invalid, "Batch complete");
            info!(
                valid = summary.valid,
                invalid = summary.invalid,
                "Running total"
            );
        }

        info!(
            batches = summary.batches,
            valid = summary.valid,
            invalid = summary.invalid,
            skipped = summary.skipped,
            "Work queue drained"
        );
        Ok(summary)
    }

    async fn process(&self, mut report_file: ReportFile) -> Result<Outcome> {
        let outcome = if is_periodic_report(&report_file.form_type) {
            self.normalize(&report_file).await
        } else {
            debug!(cik = report_file.cik, form = %report_file.form_type, "Skipping non-periodic form");
            Outcome::Skipped
        };

        report_file.parsed = true;
        self.report_files
            .insert_update_report_file(&report_file)
            .await?;
        Ok(outcome)
    }

    async fn normalize(&self, report_file: &ReportFile) -> Outcome {
        match self.try_normalize(report_file).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    cik = report_file.cik,
                    year = report_file.year,
                    quarter = report_file.quarter,
                    path = %report_file.filepath,
                    kind = ?e.kind(),
                    error = %e,
                    "Failed to normalize report"
                );
                Outcome::Invalid
            }
        }
    }

    async fn try_normalize(&self, report_file: &ReportFile) -> Result<Outcome> {
        let tags = self.engine.rules().tags();
        let raw = self
            .parser
            .parse(Path::new(&report_file.filepath), report_file, &tags)
            .await?;
        self.raw_reports.put_raw_report(&raw).await?;

        let report = self.engine.normalize(&raw).await?;
        match report.validate() {
            Ok(()) => {
                self.canonical_reports.put_canonical_report(&report).await?;
                debug!(cik = report.cik, year = report.year, quarter = report.quarter, "Saved canonical report");
                Ok(Outcome::Valid)
            }
            Err(missing) => {
                warn!(
                    cik = report.cik,
                    year = report.year,
                    quarter = report.quarter,
                    missing = %missing,
                    "Invalid financial report"
                );
                Ok(Outcome::Invalid)
            }
        }
    }
}
