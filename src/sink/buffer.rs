//! Batching buffer in front of a storage backend

use super::{SinkError, StorageBackend};
use crate::window::WindowAggregate;

/// Row count at which the buffer is flushed
pub const DEFAULT_FLUSH_ROWS: usize = 100;

/// Buffers aggregates and writes them to the backend in batches
///
/// The buffer is flushed when it reaches the threshold and again on
/// [`close`](Self::close). Rows still buffered when the sink is dropped
/// without closing are flushed on a best-effort basis.
pub struct PersistenceSink<B: StorageBackend> {
    backend: Option<B>,
    buffer: Vec<WindowAggregate>,
    flush_rows: usize,
    batches_written: usize,
    rows_written: usize,
}

impl<B: StorageBackend> PersistenceSink<B> {
    pub fn new(backend: B, flush_rows: usize) -> Self {
        let flush_rows = flush_rows.max(1);
        Self {
            backend: Some(backend),
            buffer: Vec::with_capacity(flush_rows),
            flush_rows,
            batches_written: 0,
            rows_written: 0,
        }
    }

    pub fn enqueue(&mut self, aggregate: WindowAggregate) -> Result<(), SinkError> {
        self.buffer.push(aggregate);
        if self.buffer.len() >= self.flush_rows {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let Some(backend) = self.backend.as_mut() else {
            return Ok(());
        };

        backend.write_batch(&self.buffer)?;
        log::debug!(
            "✅ Flushed {} aggregates to {}",
            self.buffer.len(),
            backend.backend_type()
        );
        self.batches_written += 1;
        self.rows_written += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }

    /// Flush remaining rows and finish the backend
    pub fn close(&mut self) -> Result<(), SinkError> {
        self.flush()?;
        if let Some(backend) = self.backend.as_mut() {
            backend.finish()?;
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Close the sink and hand back the backend
    pub fn into_backend(mut self) -> Result<B, SinkError> {
        self.close()?;
        self.backend.take().ok_or(SinkError::Closed)
    }
}

impl<B: StorageBackend> Drop for PersistenceSink<B> {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if let Err(e) = self.close() {
            log::error!("❌ Failed to flush {} buffered aggregates: {}", self.buffer.len(), e);
        }
    }
}
