//! Instance-document extraction from XBRL packages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use screener_core::{
    BlobStore, ByteStream, ReportFile, ReportFileStore, Result, ScreenerError, StorageKey,
};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use zip::ZipArchive;

/// Instance documents are named like `acme-20200331.xml`.
static INSTANCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9]+-[0-9]+\.xml").expect("valid instance pattern"));

/// Bytes read from an archive entry per chunk.
const ENTRY_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the archive reader and the blob store.
const ENTRY_CHUNKS_IN_FLIGHT: usize = 4;

/// Returns `true` if an archive entry name looks like an instance document.
///
/// The match is an unanchored, case-sensitive search.
#[must_use]
pub fn is_instance_document(name: &str) -> bool {
    INSTANCE_PATTERN.is_match(name)
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| ScreenerError::Archive(e.to_string()))
}

/// Returns the index and name of the first instance document in the archive.
///
/// Entries are scanned in archive order and the scan stops at the first match.
fn find_instance_document(path: &Path) -> Result<Option<(usize, String)>> {
    let archive = open_archive(path)?;
    let found = (0..archive.len()).find_map(|index| {
        archive
            .name_for_index(index)
            .filter(|name| is_instance_document(name))
            .map(|name| (index, name.to_string()))
    });
    Ok(found)
}

/// Reads entry `index` in fixed-size chunks and sends them to `tx`.
///
/// Stops early once the receiver is gone.
fn send_entry(path: &Path, index: usize, tx: &mpsc::Sender<Result<Vec<u8>>>) -> Result<()> {
    let mut archive = open_archive(path)?;
    let mut entry = archive
        .by_index(index)
        .map_err(|e| ScreenerError::Archive(e.to_string()))?;

    let mut buf = vec![0; ENTRY_CHUNK_SIZE];
    loop {
        let read = entry.read(&mut buf)?;
        if read == 0 || tx.blocking_send(Ok(buf[..read].to_vec())).is_err() {
            return Ok(());
        }
    }
}

/// Content of one archive entry, decompressed on a blocking thread.
struct EntryStream {
    rx: mpsc::Receiver<Result<Vec<u8>>>,
}

impl EntryStream {
    fn spawn(path: PathBuf, index: usize) -> Self {
        let (tx, rx) = mpsc::channel(ENTRY_CHUNKS_IN_FLIGHT);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = send_entry(&path, index, &tx) {
                // The receiver may already be gone; then nobody needs the error.
                let _ = tx.blocking_send(Err(e));
            }
        });
        Self { rx }
    }
}

#[async_trait]
impl ByteStream for EntryStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.rx.recv().await.transpose()
    }
}

/// Pulls the instance document out of a stored package and queues it for normalization.
#[derive(Clone)]
pub struct InstanceExtractor {
    blobs: Arc<dyn BlobStore>,
    report_files: Arc<dyn ReportFileStore>,
}

impl std::fmt::Debug for InstanceExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceExtractor").finish_non_exhaustive()
    }
}

impl InstanceExtractor {
    /// Create an extractor writing documents to `blobs` and report files to `report_files`.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, report_files: Arc<dyn ReportFileStore>) -> Self {
        Self {
            blobs,
            report_files,
        }
    }

    /// Extracts the instance document from `archive_path`, stores it under `key`
    /// and persists `report_file` pointing at the stored document.
    ///
    /// The entry is decompressed and written in chunks; it is never held in
    /// memory as a whole.
    ///
    /// # Errors
    /// Returns [`ScreenerError::InstanceNotFound`] if no entry matches, an
    /// archive error if the zip cannot be read, or a store error.
    pub async fn extract(
        &self,
        archive_path: &Path,
        key: &StorageKey,
        mut report_file: ReportFile,
    ) -> Result<ReportFile> {
        let path = archive_path.to_path_buf();
        let found = tokio::task::spawn_blocking(move || find_instance_document(&path))
            .await
            .map_err(|e| ScreenerError::Other(format!("Archive task failed: {e}")))??;

        let Some((index, entry_name)) = found else {
            return Err(ScreenerError::InstanceNotFound(
                archive_path.display().to_string(),
            ));
        };
        debug!(entry = %entry_name, "Found instance document");

        let mut body = EntryStream::spawn(archive_path.to_path_buf(), index);
        let stored = self
            .blobs
            .store_file(&key.bucket, &key.key, &mut body)
            .await?;

        report_file.filepath = stored.to_string_lossy().into_owned();
        report_file.parsed = false;
        self.report_files
            .insert_update_report_file(&report_file)
            .await?;

        info!(
            cik = report_file.cik,
            form = %report_file.form_type,
            path = %report_file.filepath,
            "Extracted instance document"
        );
        Ok(report_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use screener_core::Period;
    use screener_store::{FsBlobStore, InMemoryStore};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[rstest]
    #[case("acme-20200331.xml", true)]
    #[case("docs/acme-20200331.xml", true)]
    #[case("acme-20200331_cal.xml", false)]
    #[case("ACME-20200331.xml", false)]
    #[case("acme-20200331.xsd", false)]
    fn test_instance_pattern(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_instance_document(name), expected);
    }

    #[test]
    fn test_first_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.zip");
        write_zip(
            &path,
            &[
                ("acme-20200331.xsd", "schema"),
                ("acme-20200331.xml", "first"),
                ("beta-20200331.xml", "second"),
            ],
        );

        let (index, name) = find_instance_document(&path).unwrap().unwrap();
        assert_eq!(index, 1);
        assert_eq!(name, "acme-20200331.xml");
    }

    #[tokio::test]
    async fn test_entry_larger_than_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        let document = format!("<xbrl>{}</xbrl>", "<fact>1</fact>".repeat(20_000));
        assert!(document.len() > 3 * ENTRY_CHUNK_SIZE);
        write_zip(&archive, &[("acme-20200331.xml", document.as_str())]);

        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
        let db = Arc::new(InMemoryStore::new());
        let extractor = InstanceExtractor::new(blobs, db);

        let period = Period::new(2020, 1).unwrap();
        let key = crate::storage_key("0000012345", period, "10-K");
        let report_file = extractor
            .extract(&archive, &key, ReportFile::new(12345, period, "10-K"))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(&report_file.filepath).unwrap(),
            document.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_extract_persists_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip(&archive, &[("acme-20200331.xml", "<xbrl/>")]);

        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
        let db = Arc::new(InMemoryStore::new());
        let extractor = InstanceExtractor::new(blobs.clone(), db.clone());

        let period = Period::new(2020, 1).unwrap();
        let key = crate::storage_key("0000012345", period, "10-K");
        let stub = ReportFile::new(12345, period, "10-K");

        let report_file = extractor.extract(&archive, &key, stub).await.unwrap();
        assert!(!report_file.parsed);
        assert!(!report_file.filepath.is_empty());
        assert_eq!(std::fs::read(&report_file.filepath).unwrap(), b"<xbrl/>");

        let cached = blobs.get_file_path(&key.bucket, &key.key).await.unwrap();
        assert_eq!(cached.unwrap().to_string_lossy(), report_file.filepath);
        assert_eq!(db.report_files().await, vec![report_file]);
    }

    #[tokio::test]
    async fn test_extract_without_instance() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip(&archive, &[("FilingSummary.xml", "summary")]);

        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
        let db = Arc::new(InMemoryStore::new());
        let extractor = InstanceExtractor::new(blobs, db.clone());

        let period = Period::new(2020, 1).unwrap();
        let key = crate::storage_key("1", period, "10-Q");
        let err = extractor
            .extract(&archive, &key, ReportFile::new(1, period, "10-Q"))
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenerError::InstanceNotFound(_)));
        assert!(db.report_files().await.is_empty());
    }

    #[tokio::test]
    async fn test_extract_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        std::fs::write(&archive, b"not a zip").unwrap();

        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
        let db = Arc::new(InMemoryStore::new());
        let extractor = InstanceExtractor::new(blobs, db);

        let period = Period::new(2020, 1).unwrap();
        let key = crate::storage_key("1", period, "10-Q");
        let err = extractor
            .extract(&archive, &key, ReportFile::new(1, period, "10-Q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScreenerError::Archive(_)));
    }
}
