//! SQLite-based persisters.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use screener_core::{
    CanonicalField, CanonicalFinancialReport, CanonicalReportStore, Company, CompanyStore, Period,
    RawFinancialReport, RawReportStore, ReportFile, ReportFileStore, Result, ScreenerError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// SQLite-backed persistence for companies, report files and reports.
///
/// This store keeps everything in a single SQLite database file, providing
/// persistence across runs. The report-file table doubles as the work queue
/// drained by the normalization consumer.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn store_err(e: impl std::fmt::Display) -> ScreenerError {
    ScreenerError::Store(e.to_string())
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(store_err)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS companies (
                cik INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS report_files (
                cik INTEGER NOT NULL,
                year INTEGER NOT NULL,
                quarter INTEGER NOT NULL,
                form_type TEXT NOT NULL,
                filepath TEXT NOT NULL,
                parsed INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (cik, year, quarter, form_type)
            );

            CREATE INDEX IF NOT EXISTS idx_report_files_parsed
             ON report_files(parsed, cik, year, quarter, form_type);

            CREATE TABLE IF NOT EXISTS raw_reports (
                cik INTEGER NOT NULL,
                year INTEGER NOT NULL,
                quarter INTEGER NOT NULL,
                fields_json TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (cik, year, quarter)
            );

            CREATE TABLE IF NOT EXISTS canonical_reports (
                cik INTEGER NOT NULL,
                year INTEGER NOT NULL,
                quarter INTEGER NOT NULL,
                revenue INTEGER NOT NULL,
                operating_expense INTEGER NOT NULL,
                net_income INTEGER NOT NULL,
                current_assets INTEGER NOT NULL,
                total_assets INTEGER NOT NULL,
                current_liabilities INTEGER NOT NULL,
                total_liabilities INTEGER NOT NULL,
                operating_cash INTEGER NOT NULL,
                capital_expenditures INTEGER NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (cik, year, quarter)
            );",
        )
        .map_err(store_err)?;

        debug!("SQLite store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl CompanyStore for SqliteStore {
    #[instrument(skip(self, company), fields(cik = company.cik))]
    async fn insert_update_company(&self, company: &Company) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO companies (cik, name, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(cik) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
            params![company.cik, company.name, updated_at],
        )
        .map_err(store_err)?;

        debug!("Upserted company");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_company(&self, cik: i64) -> Result<Option<Company>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT cik, name FROM companies WHERE cik = ?1",
            params![cik],
            |row| {
                Ok(Company {
                    cik: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(store_err)
    }
}

#[async_trait]
impl ReportFileStore for SqliteStore {
    #[instrument(skip(self, report_file), fields(cik = report_file.cik, form = %report_file.form_type))]
    async fn insert_update_report_file(&self, report_file: &ReportFile) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO report_files
             (cik, year, quarter, form_type, filepath, parsed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                report_file.cik,
                report_file.year,
                report_file.quarter,
                report_file.form_type,
                report_file.filepath,
                report_file.parsed,
                updated_at
            ],
        )
        .map_err(store_err)?;

        debug!(parsed = report_file.parsed, "Upserted report file");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn next_unparsed_files(&self, limit: usize) -> Result<Vec<ReportFile>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT cik, year, quarter, form_type, filepath, parsed
                 FROM report_files
                 WHERE parsed = 0
                 ORDER BY cik, year, quarter, form_type
                 LIMIT ?1",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(ReportFile {
                    cik: row.get(0)?,
                    year: row.get(1)?,
                    quarter: row.get(2)?,
                    form_type: row.get(3)?,
                    filepath: row.get(4)?,
                    parsed: row.get(5)?,
                })
            })
            .map_err(store_err)?;

        let files = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)?;
        debug!("Found {} unparsed report files", files.len());
        Ok(files)
    }
}

#[async_trait]
impl RawReportStore for SqliteStore {
    #[instrument(skip(self))]
    async fn get_raw_report(&self, cik: i64, period: Period) -> Result<Option<RawFinancialReport>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                "SELECT fields_json FROM raw_reports
                 WHERE cik = ?1 AND year = ?2 AND quarter = ?3",
                params![cik, period.year(), period.quarter()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(store_err)?;

        match result {
            Some(json) => {
                let raw_fields: HashMap<String, i64> =
                    serde_json::from_str(&json).map_err(|e| ScreenerError::Parse(e.to_string()))?;
                debug!("Found raw report");
                Ok(Some(RawFinancialReport {
                    cik,
                    year: period.year(),
                    quarter: period.quarter(),
                    raw_fields,
                }))
            }
            None => {
                debug!("No raw report");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, report), fields(cik = report.cik))]
    async fn put_raw_report(&self, report: &RawFinancialReport) -> Result<()> {
        let period = report.period()?;
        let stored_at = Utc::now().to_rfc3339();
        let fields_json = serde_json::to_string(&report.raw_fields)
            .map_err(|e| ScreenerError::Parse(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO raw_reports (cik, year, quarter, fields_json, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report.cik,
                period.year(),
                period.quarter(),
                fields_json,
                stored_at
            ],
        )
        .map_err(store_err)?;

        debug!(fields = report.raw_fields.len(), "Stored raw report");
        Ok(())
    }
}

#[async_trait]
impl CanonicalReportStore for SqliteStore {
    #[instrument(skip(self))]
    async fn get_canonical_report(
        &self,
        cik: i64,
        period: Period,
    ) -> Result<Option<CanonicalFinancialReport>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT revenue, operating_expense, net_income, current_assets, total_assets,
                    current_liabilities, total_liabilities, operating_cash, capital_expenditures
             FROM canonical_reports
             WHERE cik = ?1 AND year = ?2 AND quarter = ?3",
            params![cik, period.year(), period.quarter()],
            |row| {
                let mut report = CanonicalFinancialReport::new(cik, period);
                for (i, field) in CanonicalField::ALL.into_iter().enumerate() {
                    report.set(field, row.get(i)?);
                }
                Ok(report)
            },
        )
        .optional()
        .map_err(store_err)
    }

    #[instrument(skip(self, report), fields(cik = report.cik))]
    async fn put_canonical_report(&self, report: &CanonicalFinancialReport) -> Result<()> {
        let stored_at = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO canonical_reports
             (cik, year, quarter, revenue, operating_expense, net_income, current_assets,
              total_assets, current_liabilities, total_liabilities, operating_cash,
              capital_expenditures, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                report.cik,
                report.year,
                report.quarter,
                report.revenue,
                report.operating_expense,
                report.net_income,
                report.current_assets,
                report.total_assets,
                report.current_liabilities,
                report.total_liabilities,
                report.operating_cash,
                report.capital_expenditures,
                stored_at
            ],
        )
        .map_err(store_err)?;

        debug!("Stored canonical report");
        Ok(())
    }
}
