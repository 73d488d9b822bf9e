#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/screener/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fundamentals normalization.
//!
//! Raw facts are read from stored instance documents by [`XbrlFactParser`],
//! corrected from fiscal-year-to-date to per-quarter values and mapped onto
//! the canonical fields by [`NormalizationEngine`]. [`ReportConsumer`] runs
//! that over the report-file work queue.

/// Batch consumer of the report-file work queue.
pub mod consumer;
/// Normalization of raw facts into canonical reports.
pub mod engine;
/// Raw tag to canonical field mapping rules.
pub mod rules;
/// Streaming fact extraction from XBRL instance documents.
pub mod xbrl;

pub use consumer::{ConsumerSummary, DEFAULT_BATCH_SIZE, ReportConsumer, is_periodic_report};
pub use engine::{NormalizationEngine, apply_rules};
pub use rules::{FieldMappingRule, MappingRules, TagGroup, VariablePeriodFields};
pub use xbrl::XbrlFactParser;
