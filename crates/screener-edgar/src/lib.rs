#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/screener/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR acquisition pipeline.
//!
//! This crate walks one quarter of the EDGAR full index and, for every filing
//! not already stored, downloads its XBRL package and extracts the instance
//! document:
//!
//! - [`IndexParser`] - Two-state parser for `xbrl.idx` files
//! - [`storage_key`] - Deterministic bucket/key per company, period and form
//! - [`PackageRetriever`] - Derives the `-xbrl.zip` URL and downloads it
//! - [`InstanceExtractor`] - Finds the instance document and queues a report file
//! - [`QuarterlyIndexScraper`] - Ties the stages together with per-record isolation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use screener_core::Period;
//! use screener_edgar::{EdgarClient, QuarterlyIndexScraper};
//! use screener_store::{FsBlobStore, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EdgarClient::new("MyApp/1.0 (contact@example.com)", Duration::from_secs(30))?;
//!     let blobs = Arc::new(FsBlobStore::new("/var/lib/screener/files")?);
//!     let db = Arc::new(SqliteStore::new("/var/lib/screener/screener.db")?);
//!
//!     let scraper = QuarterlyIndexScraper::new(client, blobs, db.clone(), db);
//!     let summary = scraper.scrape(Period::new(2020, 1)?).await?;
//!     println!("extracted {} filings", summary.extracted);
//!     Ok(())
//! }
//! ```

/// HTTP client for the EDGAR archives.
pub mod client;
/// Instance-document extraction from XBRL packages.
pub mod extract;
/// Quarterly full-index parsing.
pub mod index;
/// Storage key derivation.
pub mod key;
/// XBRL package URL derivation and download.
pub mod package;
/// Quarterly acquisition run.
pub mod scraper;

pub use client::{ARCHIVES_URL, EdgarClient, ResponseBody};
pub use extract::{InstanceExtractor, is_instance_document};
pub use index::{IndexParser, IndexRecord, ParseState, parse_index};
pub use key::storage_key;
pub use package::{PackageLocation, PackageRetriever, package_location};
pub use scraper::{IndexRunSummary, QuarterlyIndexScraper};
