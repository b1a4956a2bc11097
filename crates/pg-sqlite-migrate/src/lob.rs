//! Large object transfer.
//!
//! Object sizes come from a helper function installed into the source on
//! first use. The reader remembers whether it installed the helper so the
//! driver can remove it exactly once when the run ends.

use crate::error::{MigrateError, Result};
use crate::source::SourceCatalog;
use tracing::{debug, warn};

/// Bytes requested per `loread` call.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Reads large objects by identifier.
#[derive(Debug)]
pub struct LargeObjectReader {
    probe_installed: bool,
    chunk_size: usize,
}

impl Default for LargeObjectReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LargeObjectReader {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            probe_installed: false,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Whether the size helper is currently installed in the source.
    pub fn probe_installed(&self) -> bool {
        self.probe_installed
    }

    /// Determine the size of `oid`, installing the helper if needed.
    ///
    /// A size of zero means the probe failed and is an error.
    pub async fn size(&mut self, source: &mut dyn SourceCatalog, oid: u32) -> Result<i64> {
        if !self.probe_installed {
            source.install_lo_size_probe().await?;
            self.probe_installed = true;
        }

        let size = source.lo_size(oid).await?;
        if size <= 0 {
            return Err(MigrateError::large_object(
                oid,
                format!("size probe returned {}", size),
            ));
        }
        Ok(size)
    }

    /// Fetch the full contents of `oid`.
    ///
    /// Must run inside an open source transaction. A short read is logged
    /// and the partial buffer returned. A failing close is fatal; the source
    /// transaction is rolled back before the error is returned.
    pub async fn fetch(&mut self, source: &mut dyn SourceCatalog, oid: u32) -> Result<Vec<u8>> {
        let size = self.size(source, oid).await?;
        let expected = usize::try_from(size).map_err(|_| {
            MigrateError::large_object(oid, format!("size {} does not fit in memory", size))
        })?;

        let fd = source.lo_open(oid).await?;

        let mut buf = Vec::with_capacity(expected);
        while buf.len() < expected {
            let want = (expected - buf.len()).min(self.chunk_size);
            let chunk = match source.lo_read(fd, want).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = source.lo_close(fd).await;
                    return Err(e);
                }
            };
            if chunk.is_empty() {
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        if let Err(e) = source.lo_close(fd).await {
            if let Err(rb) = source.rollback().await {
                warn!("Rollback after failed large object close failed: {}", rb);
            }
            return Err(MigrateError::large_object(
                oid,
                format!("closing descriptor {} failed: {}", fd, e),
            ));
        }

        if buf.len() < expected {
            warn!(
                "Large object {}: read {} of {} bytes, keeping partial content",
                oid,
                buf.len(),
                expected
            );
        } else {
            debug!("Large object {}: read {} bytes", oid, buf.len());
        }

        Ok(buf)
    }

    /// Remove the size helper if this reader installed it.
    pub async fn teardown(&mut self, source: &mut dyn SourceCatalog) -> Result<()> {
        if !self.probe_installed {
            return Ok(());
        }
        self.probe_installed = false;
        source.drop_lo_size_probe().await
    }
}
