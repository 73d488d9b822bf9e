#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/screener/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! EDGAR fundamentals screener.
//!
//! Two stages share a set of stores:
//!
//! 1. Acquisition walks a quarterly full index, downloads each new filing's
//!    XBRL package and queues its instance document.
//! 2. Normalization drains that queue and maps raw facts onto nine canonical
//!    metrics, correcting cumulative cash-flow figures to per-quarter values.
//!
//! # Features
//!
//! - `sqlite` - SQLite persistence and [`Pipeline::open`]

// Core types and traits
pub use screener_core::*;

// Stores
#[cfg(feature = "sqlite")]
pub use screener_store::SqliteStore;
pub use screener_store::{FsBlobStore, InMemoryStore};

// Stages
pub use screener_edgar::{
    ARCHIVES_URL, EdgarClient, IndexRecord, IndexRunSummary, QuarterlyIndexScraper,
};
pub use screener_normalize::{
    ConsumerSummary, DEFAULT_BATCH_SIZE, MappingRules, NormalizationEngine, ReportConsumer,
    VariablePeriodFields, XbrlFactParser,
};

mod pipeline;
pub use pipeline::Pipeline;
