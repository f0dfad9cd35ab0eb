//! SQLite backend: one table per pollutant type
//!
//! Each table holds one row per (segment, window). Re-writing the same
//! window replaces the previous value.

use super::sqlite_pragma::apply_optimized_pragmas;
use super::{SinkError, StorageBackend};
use crate::pollutant::PollutantType;
use crate::window::WindowAggregate;
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub fn table_name(pollutant: PollutantType) -> String {
    format!("{}_emissions", pollutant.as_str().to_lowercase())
}

pub struct SqliteEmissionWriter {
    conn: Connection,
    pollutants: Vec<PollutantType>,
}

impl SqliteEmissionWriter {
    pub fn new(db_path: impl AsRef<Path>, pollutants: &[PollutantType]) -> Result<Self, SinkError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        for pollutant in pollutants {
            let table = table_name(*pollutant);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    segment_id TEXT NOT NULL,
                    window_start REAL NOT NULL,
                    window_end REAL NOT NULL,
                    window_label TEXT NOT NULL,
                    value REAL NOT NULL,
                    written_at INTEGER NOT NULL,
                    PRIMARY KEY (segment_id, window_start)
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_window ON {table}(window_start);"
            ))?;
        }

        log::info!(
            "✅ SQLite emission database initialized at {} ({} pollutant tables)",
            db_path.display(),
            pollutants.len()
        );

        Ok(Self {
            conn,
            pollutants: pollutants.to_vec(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl StorageBackend for SqliteEmissionWriter {
    fn write_batch(&mut self, rows: &[WindowAggregate]) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }

        let written_at = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        for pollutant in &self.pollutants {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO {}
                 (segment_id, window_start, window_end, window_label, value, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                table_name(*pollutant)
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.segment_id,
                    row.window_start,
                    row.window_end,
                    row.label(),
                    row.sums[*pollutant],
                    written_at,
                ])?;
            }
        }
        tx.commit()?;

        log::debug!("✅ Flushed {} aggregates to SQLite", rows.len());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

/// Segment × window matrix of one pollutant, as read back from SQLite
#[derive(Debug, Clone, PartialEq)]
pub struct PollutantTable {
    pub pollutant: PollutantType,
    /// Window labels ordered by window start
    pub windows: Vec<String>,
    /// Values per segment, one per window; absent cells are zero
    pub rows: BTreeMap<String, Vec<f64>>,
}

impl PollutantTable {
    pub fn value(&self, segment_id: &str, window_label: &str) -> Option<f64> {
        let column = self.windows.iter().position(|w| w == window_label)?;
        self.rows.get(segment_id).map(|values| values[column])
    }
}

pub fn load_pollutant_table(
    conn: &Connection,
    pollutant: PollutantType,
) -> Result<PollutantTable, SinkError> {
    let table = table_name(pollutant);

    let mut stmt = conn.prepare(&format!(
        "SELECT window_label, MIN(window_start) AS start FROM {table}
         GROUP BY window_label ORDER BY start"
    ))?;
    let windows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let columns: HashMap<&str, usize> = windows
        .iter()
        .enumerate()
        .map(|(i, w)| (w.as_str(), i))
        .collect();

    let mut stmt = conn.prepare(&format!(
        "SELECT segment_id, window_label, value FROM {table} ORDER BY segment_id, window_start"
    ))?;
    let cells = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut rows: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for cell in cells {
        let (segment, label, value) = cell?;
        if let Some(column) = columns.get(label.as_str()) {
            rows.entry(segment).or_insert_with(|| vec![0.0; windows.len()])[*column] = value;
        }
    }

    Ok(PollutantTable {
        pollutant,
        windows,
        rows,
    })
}
