//! JSONL backend: one append-only file per pollutant type

use super::{SinkError, StorageBackend};
use crate::pollutant::PollutantType;
use crate::window::WindowAggregate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub segment_id: String,
    pub window_start: f64,
    pub window_end: f64,
    pub window: String,
    pub pollutant: PollutantType,
    pub value: f64,
    pub written_at: i64,
}

pub struct JsonlEmissionWriter {
    writers: HashMap<PollutantType, BufWriter<File>>,
    pollutants: Vec<PollutantType>,
}

impl JsonlEmissionWriter {
    pub fn new(
        base_path: impl AsRef<Path>,
        pollutants: &[PollutantType],
    ) -> Result<Self, SinkError> {
        let base_path = base_path.as_ref();
        std::fs::create_dir_all(base_path)?;

        let mut writers = HashMap::new();
        for pollutant in pollutants {
            let file_path = base_path.join(format!("{}.jsonl", pollutant.as_str().to_lowercase()));
            let file = OpenOptions::new().create(true).append(true).open(&file_path)?;

            log::info!("📝 Writing {} emissions to: {}", pollutant, file_path.display());
            writers.insert(*pollutant, BufWriter::new(file));
        }

        Ok(Self {
            writers,
            pollutants: pollutants.to_vec(),
        })
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for JsonlEmissionWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl StorageBackend for JsonlEmissionWriter {
    fn write_batch(&mut self, rows: &[WindowAggregate]) -> Result<(), SinkError> {
        let written_at = chrono::Utc::now().timestamp();
        for pollutant in &self.pollutants {
            let Some(writer) = self.writers.get_mut(pollutant) else {
                continue;
            };
            for row in rows {
                let record = EmissionRecord {
                    segment_id: row.segment_id.clone(),
                    window_start: row.window_start,
                    window_end: row.window_end,
                    window: row.label(),
                    pollutant: *pollutant,
                    value: row.sums[*pollutant],
                    written_at,
                };
                writeln!(writer, "{}", serde_json::to_string(&record)?)?;
            }
        }
        self.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
