//! In-memory backend, used by tests and embedders that consume aggregates directly

use super::{SinkError, StorageBackend};
use crate::window::WindowAggregate;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    batches: Vec<Vec<WindowAggregate>>,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose every write fails
    pub fn failing() -> Self {
        Self {
            batches: Vec::new(),
            fail_writes: true,
        }
    }

    pub fn batches(&self) -> &[Vec<WindowAggregate>] {
        &self.batches
    }

    pub fn rows(&self) -> impl Iterator<Item = &WindowAggregate> {
        self.batches.iter().flatten()
    }
}

impl StorageBackend for MemoryBackend {
    fn write_batch(&mut self, rows: &[WindowAggregate]) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory backend configured to fail",
            )));
        }
        self.batches.push(rows.to_vec());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Memory"
    }
}
