//! Aggregates SUMO vehicle emission traces onto a reference street network
//!
//! Samples come from a recorded emission trace ([`trace::FileReplaySource`])
//! or a running simulation ([`trace::LiveSamplingSource`]). They are mapped
//! from network edges to street segments, summed per segment over tumbling
//! time windows and persisted in batches.

pub mod config;
pub mod engine;
pub mod pollutant;
pub mod sink;
pub mod spatial;
pub mod time;
pub mod trace;
pub mod window;
mod xml;

pub use config::{BackendType, ConfigError, EngineConfig, RunWindow};
pub use engine::{EmissionEngine, EngineError, RunSummary};
pub use pollutant::{PollutantSums, PollutantType};
pub use time::{parse_time_literal, RangeEnd, SimTime};
pub use window::{ClosedWindow, TimeWindowAccumulator, WindowAggregate};
