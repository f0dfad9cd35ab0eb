//! Tumbling time window aggregation of emission samples per street segment

use crate::pollutant::PollutantSums;
use crate::spatial::{EdgeToSegmentMap, MappingError};
use crate::time::{time_ge, time_lt, window_label, SimTime};
use crate::trace::EmissionSample;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Summed quantities of one street segment over one closed window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAggregate {
    pub segment_id: String,
    pub window_start: SimTime,
    pub window_end: SimTime,
    pub sums: PollutantSums,
}

impl WindowAggregate {
    /// `"H:MM:SS.ss-H:MM:SS.ss"`
    pub fn label(&self) -> String {
        window_label(self.window_start, self.window_end)
    }
}

/// A window `[start, end)` that will receive no further samples
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow {
    pub start: SimTime,
    pub end: SimTime,
    /// Ordered by segment id
    pub aggregates: Vec<WindowAggregate>,
}

/// Accumulates samples into closed-open windows of fixed length
///
/// Window boundaries are `origin + k * length`. A sample whose timestamp
/// falls exactly on a boundary belongs to the window starting there, so
/// callers must [`tick`](Self::tick) to the sample time before absorbing it.
/// An infinite length yields a single window closed by [`finish`](Self::finish).
pub struct TimeWindowAccumulator {
    origin: SimTime,
    length: SimTime,
    index: u64,
    sums: HashMap<String, PollutantSums>,
}

impl TimeWindowAccumulator {
    pub fn new(origin: SimTime, length: SimTime) -> Self {
        Self {
            origin,
            length,
            index: 0,
            sums: HashMap::new(),
        }
    }

    pub fn window_start(&self) -> SimTime {
        if self.index == 0 {
            // 0 * INFINITY is NaN
            return self.origin;
        }
        self.origin + self.index as f64 * self.length
    }

    fn window_end(&self) -> SimTime {
        self.origin + (self.index + 1) as f64 * self.length
    }

    /// Add a sample to the segment its edge maps to
    pub fn absorb(
        &mut self,
        sample: &EmissionSample,
        map: &EdgeToSegmentMap,
    ) -> Result<(), MappingError> {
        let segment = map.segment_for(&sample.edge_id)?;
        match self.sums.get_mut(segment) {
            Some(sums) => *sums += &sample.quantities,
            None => {
                self.sums.insert(segment.to_string(), sample.quantities);
            }
        }
        Ok(())
    }

    /// Close every window that ends at or before `now`
    ///
    /// Windows without samples are still reported so the sequence of closed
    /// windows tiles the covered range.
    pub fn tick(&mut self, now: SimTime) -> Vec<ClosedWindow> {
        let mut closed = Vec::new();
        if !self.length.is_finite() {
            return closed;
        }
        while time_ge(now, self.window_end()) {
            let end = self.window_end();
            closed.push(self.take_window(end));
            self.index += 1;
        }
        closed
    }

    /// Close remaining windows up to `end`, including a trailing partial one
    pub fn finish(mut self, end: SimTime) -> Vec<ClosedWindow> {
        let mut closed = self.tick(end);
        if time_lt(self.window_start(), end) {
            closed.push(self.take_window(end));
        }
        closed
    }

    fn take_window(&mut self, end: SimTime) -> ClosedWindow {
        let start = self.window_start();
        let mut aggregates: Vec<WindowAggregate> = self
            .sums
            .drain()
            .map(|(segment_id, sums)| WindowAggregate {
                segment_id,
                window_start: start,
                window_end: end,
                sums,
            })
            .collect();
        aggregates.sort_by(|a, b| a.segment_id.cmp(&b.segment_id));

        log::debug!(
            "🪟 Closed window {} with {} segments",
            window_label(start, end),
            aggregates.len()
        );
        ClosedWindow {
            start,
            end,
            aggregates,
        }
    }
}
