//! Unified backend that routes to SQLite or JSONL based on configuration

use super::jsonl_writer::JsonlEmissionWriter;
use super::sqlite_writer::SqliteEmissionWriter;
use super::{SinkError, StorageBackend};
use crate::config::BackendType;
use crate::pollutant::PollutantType;
use crate::window::WindowAggregate;
use std::path::Path;

pub enum SinkBackend {
    Sqlite(SqliteEmissionWriter),
    Jsonl(JsonlEmissionWriter),
}

impl SinkBackend {
    /// `path` is the database file for SQLite and the output directory for JSONL
    pub fn open(
        backend: BackendType,
        path: impl AsRef<Path>,
        pollutants: &[PollutantType],
    ) -> Result<Self, SinkError> {
        match backend {
            BackendType::Sqlite => {
                Ok(SinkBackend::Sqlite(SqliteEmissionWriter::new(path, pollutants)?))
            }
            BackendType::Jsonl => {
                Ok(SinkBackend::Jsonl(JsonlEmissionWriter::new(path, pollutants)?))
            }
        }
    }
}

impl StorageBackend for SinkBackend {
    fn write_batch(&mut self, rows: &[WindowAggregate]) -> Result<(), SinkError> {
        match self {
            SinkBackend::Sqlite(w) => w.write_batch(rows),
            SinkBackend::Jsonl(w) => w.write_batch(rows),
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        match self {
            SinkBackend::Sqlite(w) => w.finish(),
            SinkBackend::Jsonl(w) => w.finish(),
        }
    }

    fn backend_type(&self) -> &'static str {
        match self {
            SinkBackend::Sqlite(w) => w.backend_type(),
            SinkBackend::Jsonl(w) => w.backend_type(),
        }
    }
}
