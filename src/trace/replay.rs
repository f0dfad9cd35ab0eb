//! File replay source over a recorded emission trace

use super::resolver::EdgeResolver;
use super::sample::{EmissionSample, EmissionSource, SourceEvent};
use super::snapshot::{Snapshot, SnapshotReader};
use super::splitter::{
    self, TraceChunk, DEFAULT_CHUNK_BYTES, DEFAULT_CHUNK_DIR, DEFAULT_SAFE_PARSE_BYTES,
};
use super::TraceError;
use crate::pollutant::PollutantType;
use crate::time::{time_eq, time_ge, time_lt, RangeEnd, SimTime};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// SUMO's default step length, used when a trace has a single snapshot
const FALLBACK_STEP_LENGTH: SimTime = 1.0;

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// First sampled time; defaults to the first snapshot in the trace
    pub from: Option<SimTime>,
    pub end: RangeEnd,
    /// Inferred from the first two snapshots when unset
    pub step_length: Option<SimTime>,
    pub safe_parse_bytes: u64,
    pub chunk_bytes: u64,
    pub chunk_dir: PathBuf,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            from: None,
            end: RangeEnd::ToEnd,
            step_length: None,
            safe_parse_bytes: DEFAULT_SAFE_PARSE_BYTES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            chunk_dir: PathBuf::from(DEFAULT_CHUNK_DIR),
        }
    }
}

/// Reads snapshots from a sequence of trace documents as one stream
struct ChunkedReader {
    paths: Vec<PathBuf>,
    next_index: usize,
    current: Option<SnapshotReader<BufReader<File>>>,
}

impl ChunkedReader {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next_index: 0,
            current: None,
        }
    }

    fn next_snapshot(&mut self) -> Result<Option<Snapshot>, TraceError> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(snapshot) = reader.next_snapshot()? {
                    return Ok(Some(snapshot));
                }
                self.current = None;
            }

            let Some(path) = self.paths.get(self.next_index) else {
                return Ok(None);
            };
            if !path.exists() {
                return Err(TraceError::MissingTraceChunk {
                    index: self.next_index,
                    path: path.clone(),
                });
            }
            log::debug!("Reading trace document {}", path.display());
            self.current = Some(SnapshotReader::new(BufReader::new(File::open(path)?)));
            self.next_index += 1;
        }
    }
}

/// Replays a recorded trace as a stream of step markers and samples
///
/// Every step time in `[from, to)` must be present, in order. Snapshots
/// before `from` are skipped; vehicles with a zero fuel rate produce no
/// sample. Per-second rates are turned into per-step quantities by
/// multiplying with the step length.
pub struct FileReplaySource {
    reader: ChunkedReader,
    chunks: Vec<TraceChunk>,
    resolver: EdgeResolver,
    lookahead: VecDeque<Snapshot>,
    pending: VecDeque<SourceEvent>,
    from: Option<SimTime>,
    to: Option<SimTime>,
    step_length: SimTime,
    steps_taken: u64,
    covered_until: Option<SimTime>,
    finished: bool,
}

impl FileReplaySource {
    pub fn open(
        path: impl AsRef<Path>,
        options: ReplayOptions,
        resolver: EdgeResolver,
    ) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let chunks = if splitter::needs_split(path, options.safe_parse_bytes)? {
            log::warn!(
                "⚠️  {} is too large to parse safely, splitting first",
                path.display()
            );
            splitter::split_trace(path, options.chunk_bytes, &options.chunk_dir)?
        } else {
            Vec::new()
        };

        let paths = if chunks.is_empty() {
            vec![path.to_path_buf()]
        } else {
            chunks.iter().map(|c| c.path.clone()).collect()
        };
        Self::from_documents(paths, chunks, options, resolver)
    }

    /// Replay an already split trace
    pub fn from_chunks(
        chunks: Vec<TraceChunk>,
        options: ReplayOptions,
        resolver: EdgeResolver,
    ) -> Result<Self, TraceError> {
        let paths = chunks.iter().map(|c| c.path.clone()).collect();
        Self::from_documents(paths, chunks, options, resolver)
    }

    fn from_documents(
        paths: Vec<PathBuf>,
        chunks: Vec<TraceChunk>,
        options: ReplayOptions,
        resolver: EdgeResolver,
    ) -> Result<Self, TraceError> {
        let mut reader = ChunkedReader::new(paths);
        let mut lookahead = VecDeque::new();

        let step_length = match options.step_length {
            Some(step) => step,
            None => {
                let inferred = infer_step_length(&mut reader, &mut lookahead)?;
                log::info!("📏 Inferred step length {:.3}s from trace", inferred);
                inferred
            }
        };

        let from = match options.from {
            Some(from) => Some(from),
            None => {
                if lookahead.is_empty() {
                    if let Some(first) = reader.next_snapshot()? {
                        lookahead.push_back(first);
                    }
                }
                lookahead.front().map(|s| s.time)
            }
        };

        let to = match (from, options.end) {
            (Some(from), end) => end.resolve(from),
            (None, RangeEnd::Until(to)) => Some(to),
            (None, _) => None,
        };

        Ok(Self {
            reader,
            chunks,
            resolver,
            lookahead,
            pending: VecDeque::new(),
            from,
            to,
            step_length,
            steps_taken: 0,
            covered_until: None,
            finished: false,
        })
    }

    /// Chunk files created for this replay, empty when the trace was read directly
    pub fn chunks(&self) -> &[TraceChunk] {
        &self.chunks
    }

    fn next_snapshot(&mut self) -> Result<Option<Snapshot>, TraceError> {
        match self.lookahead.pop_front() {
            Some(snapshot) => Ok(Some(snapshot)),
            None => self.reader.next_snapshot(),
        }
    }

    fn push_samples(&mut self, snapshot: Snapshot) -> Result<(), TraceError> {
        self.pending.push_back(SourceEvent::StepStarted(snapshot.time));
        for vehicle in snapshot.vehicles {
            if vehicle.rates[PollutantType::Fuel] <= 0.0 {
                continue;
            }
            let edge_id = self.resolver.resolve_lane(&vehicle.lane, vehicle.position())?;
            self.pending.push_back(SourceEvent::Sample(EmissionSample {
                vehicle_id: vehicle.id,
                edge_id,
                timestamp: snapshot.time,
                quantities: vehicle.rates.scaled(self.step_length),
            }));
        }
        Ok(())
    }
}

/// Start time and step spacing of a trace, read from its first two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraceHead {
    pub first_time: Option<SimTime>,
    pub step_length: Option<SimTime>,
}

/// Read the head of the unsplit trace at `path`
///
/// Streams at most two snapshots, so it is cheap even for traces that
/// [`FileReplaySource::open`] would have to split.
pub fn read_trace_head(path: impl AsRef<Path>) -> Result<TraceHead, TraceError> {
    let mut reader = SnapshotReader::new(BufReader::new(File::open(path.as_ref())?));
    let first = reader.next_snapshot()?.map(|s| s.time);
    let second = match first {
        Some(_) => reader.next_snapshot()?.map(|s| s.time),
        None => None,
    };
    Ok(TraceHead {
        first_time: first,
        step_length: match (first, second) {
            (Some(a), Some(b)) if b > a => Some(b - a),
            _ => None,
        },
    })
}

fn infer_step_length(
    reader: &mut ChunkedReader,
    lookahead: &mut VecDeque<Snapshot>,
) -> Result<SimTime, TraceError> {
    while lookahead.len() < 2 {
        match reader.next_snapshot()? {
            Some(snapshot) => lookahead.push_back(snapshot),
            None => break,
        }
    }
    match (lookahead.front(), lookahead.get(1)) {
        (Some(first), Some(second)) if second.time > first.time => Ok(second.time - first.time),
        (Some(_), Some(_)) => Err(TraceError::Malformed(
            "first two snapshots are not in increasing time order".to_string(),
        )),
        _ => {
            log::warn!(
                "⚠️  Cannot infer step length from fewer than two snapshots, using {}s",
                FALLBACK_STEP_LENGTH
            );
            Ok(FALLBACK_STEP_LENGTH)
        }
    }
}

impl EmissionSource for FileReplaySource {
    fn next_event(&mut self) -> Result<Option<SourceEvent>, TraceError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            let Some(from) = self.from else {
                // empty trace with no explicit start
                self.finished = true;
                return Ok(None);
            };
            let expected = from + self.steps_taken as f64 * self.step_length;

            if let Some(to) = self.to {
                if time_ge(expected, to) {
                    self.finished = true;
                    self.covered_until = Some(to);
                    return Ok(None);
                }
            }

            match self.next_snapshot()? {
                None if self.to.is_some() => {
                    return Err(TraceError::MissingTimestep { time: expected });
                }
                None => {
                    self.finished = true;
                    self.covered_until = Some(expected);
                    return Ok(None);
                }
                Some(snapshot) if time_lt(snapshot.time, expected) && self.steps_taken == 0 => {
                    continue;
                }
                Some(snapshot) if time_eq(snapshot.time, expected) => {
                    self.steps_taken += 1;
                    self.push_samples(snapshot)?;
                }
                Some(snapshot) if time_lt(snapshot.time, expected) => {
                    return Err(TraceError::Malformed(format!(
                        "snapshot {:.2} is out of order, expected {:.2}",
                        snapshot.time, expected
                    )));
                }
                Some(_) => {
                    return Err(TraceError::MissingTimestep { time: expected });
                }
            }
        }
    }

    fn range_start(&self) -> Option<SimTime> {
        self.from
    }

    fn range_end(&self) -> Option<SimTime> {
        self.to
    }

    fn covered_until(&self) -> Option<SimTime> {
        self.covered_until
    }

    fn step_length(&self) -> Option<SimTime> {
        Some(self.step_length)
    }
}
