//! Filesystem blob store.

use async_trait::async_trait;
use screener_core::{BlobStore, ByteStream, Result, ScreenerError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Suffix of files still being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// Blob store that keeps each bucket as a directory under a root.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a blob store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the root directory cannot be created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        check_component(bucket)?;
        check_component(name)?;
        Ok(self.root.join(bucket).join(name))
    }
}

/// Bucket and file names must be single path components.
fn check_component(component: &str) -> Result<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\'])
    {
        return Err(ScreenerError::InvalidParameter(format!(
            "invalid storage name: {component:?}"
        )));
    }
    Ok(())
}

async fn write_stream(path: &Path, body: &mut dyn ByteStream) -> Result<usize> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0;
    while let Some(chunk) = body.next_chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self))]
    async fn get_file_path(&self, bucket: &str, key: &str) -> Result<Option<PathBuf>> {
        let path = self.resolve(bucket, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, body))]
    async fn store_file(
        &self,
        bucket: &str,
        name: &str,
        body: &mut dyn ByteStream,
    ) -> Result<PathBuf> {
        let path = self.resolve(bucket, name)?;
        tokio::fs::create_dir_all(self.root.join(bucket)).await?;

        let partial = path.with_file_name(format!("{name}{PARTIAL_SUFFIX}"));
        let written = match write_stream(&partial, body).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove) = tokio::fs::remove_file(&partial).await {
                    warn!(path = %partial.display(), error = %remove, "Failed to remove partial file");
                }
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, &path).await?;

        debug!(path = %path.display(), bytes = written, "Stored file");
        Ok(path)
    }
}
