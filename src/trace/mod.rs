//! Trace source adapters
//!
//! Two interchangeable producers of the same [`SourceEvent`] stream:
//! - [`FileReplaySource`] streams a recorded SUMO emission-export trace
//!   (splitting it first when it is too large to parse safely)
//! - [`LiveSamplingSource`] polls a running simulation step by step
//!
//! Both resolve lane/edge references to base network edges through
//! [`EdgeResolver`] before a sample is built.

pub mod live;
pub mod replay;
pub mod resolver;
pub mod sample;
pub mod snapshot;
pub mod splitter;

pub use live::{LiveSamplingSource, SimulationConnection};
pub use replay::{read_trace_head, FileReplaySource, ReplayOptions, TraceHead};
pub use resolver::EdgeResolver;
pub use sample::{EmissionSample, EmissionSource, SourceEvent};
pub use snapshot::{Snapshot, SnapshotReader, VehicleRecord};
pub use splitter::{needs_split, split_trace, TraceChunk};

use crate::spatial::MappingError;
use crate::time::SimTime;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("time {time:.2} was not generated in the emission trace")]
    MissingTimestep { time: SimTime },
    #[error("trace chunk {index} is missing: {}", path.display())]
    MissingTraceChunk { index: usize, path: PathBuf },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("malformed trace: {0}")]
    Malformed(String),
    #[error("simulation connection error: {0}")]
    Simulation(String),
    #[error(transparent)]
    Mapping(#[from] MappingError),
}
