use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::{fs, io};

use super::BlobStore;
use crate::{Error, Result};

const TEMP_EXT: &str = "tmp";

/// Blob store backed by a local directory, one directory per bucket.
///
/// Here is the layout of a bucket in the local storage:
///
/// ```text
///     - root local storage
///       L {bucket}
///         L {lesson_slug}
///           L {asset_type}.pdf
///           L {asset_type}.pdf.{n}.tmp    (partial write, renamed in place once complete)
/// ```
///
/// Content types are not persisted, every key already carries its extension.
#[derive(Debug, Clone)]
pub struct FsStore {
    path: PathBuf,
}

impl FsStore {
    /// Create a store writing into `root/bucket`.
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Result<Self> {
        crate::lesson::check_key_component("bucket", bucket)?;

        Ok(Self {
            path: root.as_ref().join(bucket),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Return the expected path in the local storage related to this key.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.path.clone();

        for segment in key.split('/') {
            crate::lesson::check_key_component("key segment", segment)?;
            path.push(segment);
        }

        Ok(path)
    }

    async fn write(path: &Path, body: &[u8]) -> io::Result<()> {
        use io::AsyncWriteExt;

        // two puts on the same key may overlap, give each one its own partial file
        static WRITE_ID: AtomicUsize = AtomicUsize::new(0);
        let id = WRITE_ID.fetch_add(1, Ordering::Relaxed);

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{id}.{TEMP_EXT}"));
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::File::options().write(true).create_new(true).open(&tmp).await?;
        let mut writer = io::BufWriter::new(file);

        let written = async {
            writer.write_all(body).await?;
            writer.shutdown().await?;
            writer.get_ref().sync_all().await?;

            fs::rename(&tmp, path).await
        }
        .await;

        if written.is_err() {
            // delete incomplete object
            let _ = fs::remove_file(&tmp).await;
        }

        written
    }
}

impl BlobStore for FsStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;

        tracing::trace!("Writing {} bytes ({content_type}) to local storage: `{}`", body.len(), path.display());

        Self::write(&path, &body).await.map_err(Error::storage)
    }
}
