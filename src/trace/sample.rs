//! Normalized emission sample model shared by every trace source

use super::TraceError;
use crate::pollutant::PollutantSums;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};

/// Pollutant quantities emitted on one base network edge during one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionSample {
    pub vehicle_id: String,
    pub edge_id: String,
    pub timestamp: SimTime,
    pub quantities: PollutantSums,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Simulation time advanced to the start of a sampled step
    StepStarted(SimTime),
    Sample(EmissionSample),
}

pub trait EmissionSource {
    /// Next event, or `Ok(None)` at end of stream
    fn next_event(&mut self) -> Result<Option<SourceEvent>, TraceError>;

    /// First sampled time, once known
    fn range_start(&self) -> Option<SimTime>;

    /// Configured exclusive end, `None` for open-ended runs
    fn range_end(&self) -> Option<SimTime>;

    /// Exclusive end of the covered range, known after end of stream
    fn covered_until(&self) -> Option<SimTime>;

    /// Step length in seconds, once known
    fn step_length(&self) -> Option<SimTime>;

    /// Next sample, skipping step markers
    fn next_sample(&mut self) -> Result<Option<EmissionSample>, TraceError> {
        loop {
            match self.next_event()? {
                Some(SourceEvent::Sample(sample)) => return Ok(Some(sample)),
                Some(SourceEvent::StepStarted(_)) => continue,
                None => return Ok(None),
            }
        }
    }
}
