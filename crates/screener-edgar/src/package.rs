//! XBRL package URL derivation and download.
//!
//! The full index lists each filing's complete submission text file, e.g.
//! `edgar/data/12345/0000012345-20-000012.txt`. The XBRL package for the same
//! accession lives in the accession's directory:
//! `edgar/data/12345/000001234520000012/0000012345-20-000012-xbrl.zip`.

use chrono::Utc;
use screener_core::{BlobStore, Result, ScreenerError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::EdgarClient;

/// Suffix of XBRL package archives.
pub const XBRL_ZIP_SUFFIX: &str = "-xbrl.zip";

/// Where a filing's XBRL package can be downloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageLocation {
    /// Full package URL.
    pub url: String,
    /// Accession basename (the `.txt` file name without its extension).
    pub basename: String,
}

/// Derives the package URL for an index filename under `archive_root`.
///
/// # Errors
/// Returns [`ScreenerError::UnexpectedFileType`] if the filename does not
/// reference a `.txt` document in the fourth path component.
pub fn package_location(archive_root: &str, filename: &str) -> Result<PackageLocation> {
    if !filename.contains(".txt") {
        return Err(ScreenerError::UnexpectedFileType(filename.to_string()));
    }

    let mut parts: Vec<String> = filename.split('/').map(str::to_string).collect();
    let basename = parts
        .get(3)
        .and_then(|part| part.strip_suffix(".txt"))
        .map(str::to_string)
        .ok_or_else(|| ScreenerError::UnexpectedFileType(filename.to_string()))?;

    let dashless = basename.replace('-', "");
    parts[3] = format!("{dashless}/{basename}{XBRL_ZIP_SUFFIX}");

    Ok(PackageLocation {
        url: format!("{archive_root}{}", parts.join("/")),
        basename,
    })
}

/// Downloads XBRL packages into the blob store.
#[derive(Clone)]
pub struct PackageRetriever {
    client: EdgarClient,
    blobs: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for PackageRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageRetriever")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl PackageRetriever {
    /// Create a retriever that stores downloads in `blobs`.
    #[must_use]
    pub fn new(client: EdgarClient, blobs: Arc<dyn BlobStore>) -> Self {
        Self { client, blobs }
    }

    /// Downloads the package for `filename` into `bucket` and returns the stored path.
    ///
    /// The archive is stored under a name prefixed with the current Unix time so
    /// repeated downloads of the same accession never collide.
    ///
    /// # Errors
    /// Returns a format error for non-`.txt` filenames, a network error if the
    /// download fails, or a store error if the archive cannot be written.
    pub async fn retrieve(&self, filename: &str, bucket: &str) -> Result<PathBuf> {
        let location = package_location(self.client.archive_root(), filename)?;

        info!(url = %location.url, "Getting xbrl zip");
        let mut body = self.client.get_stream(&location.url).await?;

        let name = format!(
            "{}{}{}",
            Utc::now().timestamp(),
            location.basename,
            XBRL_ZIP_SUFFIX
        );
        let path = self.blobs.store_file(bucket, &name, &mut body).await?;
        debug!(path = %path.display(), "Stored xbrl zip");
        Ok(path)
    }
}
