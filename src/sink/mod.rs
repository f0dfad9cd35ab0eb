//! Persistence of closed-window aggregates
//!
//! [`PersistenceSink`] buffers aggregates and hands them to a
//! [`StorageBackend`] in batches. Backends:
//! - [`SqliteEmissionWriter`]: one table per pollutant, one transaction per batch
//! - [`JsonlEmissionWriter`]: one JSONL file per pollutant
//! - [`MemoryBackend`]: keeps batches in memory

pub mod buffer;
pub mod jsonl_writer;
pub mod memory;
pub mod sqlite_pragma;
pub mod sqlite_writer;
pub mod writer;

pub use buffer::{PersistenceSink, DEFAULT_FLUSH_ROWS};
pub use jsonl_writer::JsonlEmissionWriter;
pub use memory::MemoryBackend;
pub use sqlite_writer::{load_pollutant_table, PollutantTable, SqliteEmissionWriter};
pub use writer::SinkBackend;

use crate::window::WindowAggregate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("sink backend already taken")]
    Closed,
}

/// Destination for batches of window aggregates
pub trait StorageBackend {
    /// Persist one batch; either all rows are stored or none are
    fn write_batch(&mut self, rows: &[WindowAggregate]) -> Result<(), SinkError>;

    /// Make everything written so far durable
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Backend type for logging
    fn backend_type(&self) -> &'static str;
}
