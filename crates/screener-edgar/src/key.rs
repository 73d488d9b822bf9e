//! Storage key derivation.
//!
//! Extracted instance documents live at `CIK_<cik>/Y<year>Q<quarter>FT<form>`.
//! The same key is checked before downloading, which makes re-running a quarter
//! idempotent.

use screener_core::{Period, StorageKey};

/// Returns the per-company bucket for a raw index CIK.
#[must_use]
pub fn bucket_for(cik: &str) -> String {
    format!("CIK_{cik}")
}

/// Returns the key for a form filed in a period. Every `/` in the form type
/// becomes `_` so amended forms stay a single path component.
#[must_use]
pub fn key_for(form_type: &str, period: Period) -> String {
    format!(
        "Y{}Q{}FT{}",
        period.year(),
        period.quarter(),
        form_type.replace('/', "_")
    )
}

/// Derives the bucket/key pair for a company's form in a period.
#[must_use]
pub fn storage_key(cik: &str, period: Period, form_type: &str) -> StorageKey {
    StorageKey {
        bucket: bucket_for(cik),
        key: key_for(form_type, period),
    }
}
