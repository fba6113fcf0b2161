//! File-backed transport.
//!
//! Each packed batch is written to `<dir>/<sha256>.blob`. The digest is
//! returned as the transport reference, so resubmitting an identical
//! batch is idempotent.

use std::path::{Path, PathBuf};

use blobshare_scheduler::{BoxFuture, Transport};
use sha2::{Digest, Sha256};
use tracing::debug;

pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    /// Create the transport, making `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Transport for FileTransport {
    fn submit_packed_batch<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let digest = hex::encode(Sha256::digest(payload));
            let path = self.dir.join(format!("{digest}.blob"));
            tokio::fs::write(&path, payload)
                .await
                .map_err(|e| format!("write {}: {e}", path.display()))?;
            debug!(path = %path.display(), bytes = payload.len(), "batch written");
            Ok(format!("0x{digest}"))
        })
    }
}
