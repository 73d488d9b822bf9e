//! In-memory persisters.

use async_trait::async_trait;
use screener_core::{
    CanonicalFinancialReport, CanonicalReportStore, Company, CompanyStore, Period,
    RawFinancialReport, RawReportStore, ReportFile, ReportFileStore, Result,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Key for report-file entries; ordering defines queue order.
type ReportFileKey = (i64, i64, i64, String);

/// Key for raw and canonical report entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReportKey {
    cik: i64,
    period: Period,
}

/// Simple in-memory persistence for testing and development.
///
/// Data is stored in `RwLock`-protected maps and is lost when the store
/// is dropped. Records are cloned on get/put operations.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    companies: RwLock<HashMap<i64, Company>>,
    report_files: RwLock<BTreeMap<ReportFileKey, ReportFile>>,
    raw_reports: RwLock<HashMap<ReportKey, RawFinancialReport>>,
    canonical_reports: RwLock<HashMap<ReportKey, CanonicalFinancialReport>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored company ordered by CIK.
    pub async fn companies(&self) -> Vec<Company> {
        let mut companies: Vec<Company> = self.companies.read().await.values().cloned().collect();
        companies.sort_by_key(|c| c.cik);
        companies
    }

    /// Returns every stored report file, parsed or not, in queue order.
    pub async fn report_files(&self) -> Vec<ReportFile> {
        self.report_files.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl CompanyStore for InMemoryStore {
    #[instrument(skip(self, company), fields(cik = company.cik))]
    async fn insert_update_company(&self, company: &Company) -> Result<()> {
        self.companies
            .write()
            .await
            .insert(company.cik, company.clone());
        debug!("Upserted company");
        Ok(())
    }

    async fn get_company(&self, cik: i64) -> Result<Option<Company>> {
        Ok(self.companies.read().await.get(&cik).cloned())
    }
}

#[async_trait]
impl ReportFileStore for InMemoryStore {
    #[instrument(skip(self, report_file), fields(cik = report_file.cik, form = %report_file.form_type))]
    async fn insert_update_report_file(&self, report_file: &ReportFile) -> Result<()> {
        let key = (
            report_file.cik,
            report_file.year,
            report_file.quarter,
            report_file.form_type.clone(),
        );
        self.report_files
            .write()
            .await
            .insert(key, report_file.clone());
        debug!(parsed = report_file.parsed, "Upserted report file");
        Ok(())
    }

    async fn next_unparsed_files(&self, limit: usize) -> Result<Vec<ReportFile>> {
        let files = self.report_files.read().await;
        Ok(files
            .values()
            .filter(|f| !f.parsed)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RawReportStore for InMemoryStore {
    #[instrument(skip(self))]
    async fn get_raw_report(&self, cik: i64, period: Period) -> Result<Option<RawFinancialReport>> {
        let reports = self.raw_reports.read().await;
        match reports.get(&ReportKey { cik, period }) {
            Some(report) => {
                debug!("Found raw report");
                Ok(Some(report.clone()))
            }
            None => {
                debug!("No raw report");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, report), fields(cik = report.cik))]
    async fn put_raw_report(&self, report: &RawFinancialReport) -> Result<()> {
        let key = ReportKey {
            cik: report.cik,
            period: report.period()?,
        };
        self.raw_reports.write().await.insert(key, report.clone());
        debug!(fields = report.raw_fields.len(), "Stored raw report");
        Ok(())
    }
}

#[async_trait]
impl CanonicalReportStore for InMemoryStore {
    async fn get_canonical_report(
        &self,
        cik: i64,
        period: Period,
    ) -> Result<Option<CanonicalFinancialReport>> {
        Ok(self
            .canonical_reports
            .read()
            .await
            .get(&ReportKey { cik, period })
            .cloned())
    }

    #[instrument(skip(self, report), fields(cik = report.cik))]
    async fn put_canonical_report(&self, report: &CanonicalFinancialReport) -> Result<()> {
        let key = ReportKey {
            cik: report.cik,
            period: Period::new(report.year, report.quarter)?,
        };
        self.canonical_reports
            .write()
            .await
            .insert(key, report.clone());
        debug!("Stored canonical report");
        Ok(())
    }
}
