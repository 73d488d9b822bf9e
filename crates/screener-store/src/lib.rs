#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/screener/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Storage backends for the screener.
//!
//! This crate provides implementations of the collaborator traits from `screener-core`:
//!
//! - [`FsBlobStore`] - Filesystem-backed [`BlobStore`]
//! - [`SqliteStore`] - Persistent SQLite-based persisters (default, requires `sqlite` feature)
//! - [`InMemoryStore`] - Map-backed persisters for testing

/// Filesystem blob store.
pub mod fs;
/// In-memory persisters.
pub mod memory;

/// SQLite-based persisters.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the traits for convenience
pub use screener_core::{
    BlobStore, CanonicalReportStore, CompanyStore, RawReportStore, ReportFileStore,
};

// Re-export implementations
pub use fs::FsBlobStore;
pub use memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
