//! Filing parser trait.

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

use crate::{
    error::Result,
    types::{RawFinancialReport, ReportFile},
};

/// Turns a stored instance document into raw taxonomy facts.
///
/// Implementations only report the tags named in `tags`; tags that do not
/// appear in the document are left out of the returned mapping.
#[async_trait]
pub trait FilingParser: Send + Sync + Debug {
    /// Parses the document at `path` for the filing described by `report_file`.
    async fn parse(
        &self,
        path: &Path,
        report_file: &ReportFile,
        tags: &[&str],
    ) -> Result<RawFinancialReport>;
}
