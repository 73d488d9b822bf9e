#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/screener/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the EDGAR fundamentals screener.
//!
//! This crate provides the foundational abstractions shared by the acquisition
//! pipeline and the normalization engine:
//!
//! - [`BlobStore`](store::BlobStore) - Bucketed storage for downloaded and extracted files
//! - [`CompanyStore`](store::CompanyStore) - Company upserts
//! - [`ReportFileStore`](store::ReportFileStore) - The persisted report-file work queue
//! - [`RawReportStore`](store::RawReportStore) - Raw fact mappings per filing period
//! - [`CanonicalReportStore`](store::CanonicalReportStore) - Normalized reports
//! - [`FilingParser`](parser::FilingParser) - Instance document to raw facts

/// Error types for screener operations.
pub mod error;
/// Filing parser trait.
pub mod parser;
/// Fiscal period arithmetic.
pub mod period;
/// Collaborator traits for storage and persistence.
pub mod store;
/// Core data types (Company, ReportFile, financial reports).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{FailureKind, Result, ScreenerError};
pub use parser::FilingParser;
pub use period::Period;
pub use store::{
    BlobStore, BufferStream, ByteStream, CanonicalReportStore, CompanyStore, RawReportStore,
    ReportFileStore,
};
pub use types::{
    CanonicalField, CanonicalFinancialReport, Company, MissingFields, RawFinancialReport, ReportFile,
    StorageKey,
};
