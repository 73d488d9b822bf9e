//! Core data types for filings and financial reports.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Company`] - A filer, keyed by CIK
//! - [`ReportFile`] - An extracted instance document awaiting normalization
//! - [`RawFinancialReport`] - Raw taxonomy facts for one filing period
//! - [`CanonicalField`] - The nine canonical screening metrics
//! - [`CanonicalFinancialReport`] - Normalized metrics for one filing period
//! - [`StorageKey`] - Bucket/key address of an extracted document

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::error::Result;
use crate::period::Period;

/// A filer as seen in a quarterly index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Company {
    /// Central Index Key.
    pub cik: i64,
    /// Company name as listed in the index.
    pub name: String,
}

impl Company {
    /// Creates a new company.
    #[must_use]
    pub fn new(cik: i64, name: impl Into<String>) -> Self {
        Self {
            cik,
            name: name.into(),
        }
    }
}

/// An extracted instance document tracked through normalization.
///
/// Identity is `(cik, year, quarter, form_type)`. Records are created with
/// `parsed = false` and flipped once normalization has been attempted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportFile {
    /// Central Index Key of the filer.
    pub cik: i64,
    /// Index year.
    pub year: i64,
    /// Index quarter (1-4).
    pub quarter: i64,
    /// Form type as listed in the index (e.g., "10-K", "10-Q/A").
    pub form_type: String,
    /// Path of the stored instance document.
    pub filepath: String,
    /// Whether normalization has been attempted.
    pub parsed: bool,
}

impl ReportFile {
    /// Creates an unparsed report file stub without a path.
    #[must_use]
    pub fn new(cik: i64, period: Period, form_type: impl Into<String>) -> Self {
        Self {
            cik,
            year: period.year(),
            quarter: period.quarter(),
            form_type: form_type.into(),
            filepath: String::new(),
            parsed: false,
        }
    }

    /// Returns the validated reporting period of this file.
    ///
    /// # Errors
    /// Returns an error if the stored year/quarter pair is out of range.
    pub fn period(&self) -> Result<Period> {
        Period::new(self.year, self.quarter)
    }
}

/// Raw taxonomy facts extracted from one filing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFinancialReport {
    /// Central Index Key of the filer.
    pub cik: i64,
    /// Index year.
    pub year: i64,
    /// Index quarter (1-4).
    pub quarter: i64,
    /// Raw tag name to value, as reported in the filing.
    pub raw_fields: HashMap<String, i64>,
}

impl RawFinancialReport {
    /// Creates an empty raw report for a period.
    #[must_use]
    pub fn new(cik: i64, period: Period) -> Self {
        Self {
            cik,
            year: period.year(),
            quarter: period.quarter(),
            raw_fields: HashMap::new(),
        }
    }

    /// Sets a raw field value.
    #[must_use]
    pub fn with_field(mut self, tag: impl Into<String>, value: i64) -> Self {
        self.raw_fields.insert(tag.into(), value);
        self
    }

    /// Returns the validated reporting period of this report.
    ///
    /// # Errors
    /// Returns an error if the stored year/quarter pair is out of range.
    pub fn period(&self) -> Result<Period> {
        Period::new(self.year, self.quarter)
    }

    /// Returns a raw field value.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<i64> {
        self.raw_fields.get(tag).copied()
    }
}

/// The canonical screening metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    /// Total revenue.
    Revenue,
    /// Operating expense.
    OperatingExpense,
    /// Net income.
    NetIncome,
    /// Current assets.
    CurrentAssets,
    /// Total assets.
    TotalAssets,
    /// Current liabilities.
    CurrentLiabilities,
    /// Total liabilities.
    TotalLiabilities,
    /// Operating cash flow.
    OperatingCash,
    /// Capital expenditures.
    CapitalExpenditures,
}

impl CanonicalField {
    /// All canonical fields in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Revenue,
        Self::OperatingExpense,
        Self::NetIncome,
        Self::CurrentAssets,
        Self::TotalAssets,
        Self::CurrentLiabilities,
        Self::TotalLiabilities,
        Self::OperatingCash,
        Self::CapitalExpenditures,
    ];

    /// Order in which missing fields are reported.
    pub const VALIDATION_ORDER: [Self; 9] = [
        Self::Revenue,
        Self::OperatingExpense,
        Self::NetIncome,
        Self::TotalAssets,
        Self::TotalLiabilities,
        Self::CurrentAssets,
        Self::CurrentLiabilities,
        Self::OperatingCash,
        Self::CapitalExpenditures,
    ];

    /// Returns the field name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::OperatingExpense => "OperatingExpense",
            Self::NetIncome => "NetIncome",
            Self::CurrentAssets => "CurrentAssets",
            Self::TotalAssets => "TotalAssets",
            Self::CurrentLiabilities => "CurrentLiabilities",
            Self::TotalLiabilities => "TotalLiabilities",
            Self::OperatingCash => "OperatingCash",
            Self::CapitalExpenditures => "CapitalExpenditures",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized financial metrics for one filing period.
///
/// A value of zero means the field could not be derived.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFinancialReport {
    /// Central Index Key of the filer.
    pub cik: i64,
    /// Index year.
    pub year: i64,
    /// Index quarter (1-4).
    pub quarter: i64,
    /// Total revenue.
    pub revenue: i64,
    /// Operating expense.
    pub operating_expense: i64,
    /// Net income.
    pub net_income: i64,
    /// Current assets.
    pub current_assets: i64,
    /// Total assets.
    pub total_assets: i64,
    /// Current liabilities.
    pub current_liabilities: i64,
    /// Total liabilities.
    pub total_liabilities: i64,
    /// Operating cash flow for the quarter.
    pub operating_cash: i64,
    /// Capital expenditures for the quarter.
    pub capital_expenditures: i64,
}

impl CanonicalFinancialReport {
    /// Creates an empty report for a period.
    #[must_use]
    pub fn new(cik: i64, period: Period) -> Self {
        Self {
            cik,
            year: period.year(),
            quarter: period.quarter(),
            ..Default::default()
        }
    }

    /// Returns the value of a canonical field.
    #[must_use]
    pub const fn get(&self, field: CanonicalField) -> i64 {
        match field {
            CanonicalField::Revenue => self.revenue,
            CanonicalField::OperatingExpense => self.operating_expense,
            CanonicalField::NetIncome => self.net_income,
            CanonicalField::CurrentAssets => self.current_assets,
            CanonicalField::TotalAssets => self.total_assets,
            CanonicalField::CurrentLiabilities => self.current_liabilities,
            CanonicalField::TotalLiabilities => self.total_liabilities,
            CanonicalField::OperatingCash => self.operating_cash,
            CanonicalField::CapitalExpenditures => self.capital_expenditures,
        }
    }

    /// Sets the value of a canonical field.
    pub fn set(&mut self, field: CanonicalField, value: i64) {
        let slot = match field {
            CanonicalField::Revenue => &mut self.revenue,
            CanonicalField::OperatingExpense => &mut self.operating_expense,
            CanonicalField::NetIncome => &mut self.net_income,
            CanonicalField::CurrentAssets => &mut self.current_assets,
            CanonicalField::TotalAssets => &mut self.total_assets,
            CanonicalField::CurrentLiabilities => &mut self.current_liabilities,
            CanonicalField::TotalLiabilities => &mut self.total_liabilities,
            CanonicalField::OperatingCash => &mut self.operating_cash,
            CanonicalField::CapitalExpenditures => &mut self.capital_expenditures,
        };
        *slot = value;
    }

    /// Returns the fields that are still unset, in reporting order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::VALIDATION_ORDER
            .into_iter()
            .filter(|field| self.get(*field) == 0)
            .collect()
    }

    /// Checks that every canonical field is set.
    ///
    /// # Errors
    /// Returns [`MissingFields`] naming every unset field.
    pub fn validate(&self) -> std::result::Result<(), MissingFields> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingFields(missing))
        }
    }

    /// Returns true if every canonical field is set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Canonical fields left unset after mapping.
///
/// Displays as each field name followed by a comma, e.g. `"Revenue,NetIncome,"`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", render_missing(.0))]
pub struct MissingFields(pub Vec<CanonicalField>);

fn render_missing(fields: &[CanonicalField]) -> String {
    fields.iter().map(|f| format!("{},", f.name())).collect()
}

/// Bucket/key address of an extracted instance document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    /// Per-company partition.
    pub bucket: String,
    /// Period and form identifier within the bucket.
    pub key: String,
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_report() -> CanonicalFinancialReport {
        let mut report = CanonicalFinancialReport::new(1, Period::new(2020, 2).unwrap());
        for (i, field) in CanonicalField::ALL.into_iter().enumerate() {
            report.set(field, i as i64 + 1);
        }
        report
    }

    #[test]
    fn test_field_accessors() {
        let report = complete_report();
        assert_eq!(report.revenue, 1);
        assert_eq!(report.capital_expenditures, 9);
        assert_eq!(report.get(CanonicalField::TotalLiabilities), 7);
        assert!(report.is_valid());
    }

    #[test]
    fn test_missing_only_capex() {
        let mut report = complete_report();
        report.set(CanonicalField::CapitalExpenditures, 0);
        let err = report.validate().unwrap_err();
        assert_eq!(err.0, vec![CanonicalField::CapitalExpenditures]);
        assert_eq!(err.to_string(), "CapitalExpenditures,");
    }

    #[test]
    fn test_missing_fields_reporting_order() {
        let report = CanonicalFinancialReport::default();
        let err = report.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Revenue,OperatingExpense,NetIncome,TotalAssets,TotalLiabilities,\
             CurrentAssets,CurrentLiabilities,OperatingCash,CapitalExpenditures,"
        );
    }

    #[test]
    fn test_raw_report_serde() {
        let raw = RawFinancialReport::new(42, Period::new(2019, 4).unwrap())
            .with_field("Assets", 1_000);
        let json = serde_json::to_string(&raw).unwrap();
        let back: RawFinancialReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("Assets"), Some(1_000));
        assert_eq!(back.period().unwrap(), Period::new(2019, 4).unwrap());
    }
}
