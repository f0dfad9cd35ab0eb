//! Live sampling source over a running simulation

use super::resolver::{is_internal, EdgeResolver};
use super::sample::{EmissionSample, EmissionSource, SourceEvent};
use super::TraceError;
use crate::pollutant::{PollutantSums, PollutantType};
use crate::time::{time_ge, time_lt, SimTime};
use std::collections::{HashSet, VecDeque};

/// Blocking request/response connection to a running simulation
///
/// Implementations wrap the simulator's control protocol; every call is
/// answered before the next one is issued.
pub trait SimulationConnection {
    fn current_time(&mut self) -> Result<SimTime, TraceError>;
    fn step_length(&mut self) -> Result<SimTime, TraceError>;
    fn active_vehicle_ids(&mut self) -> Result<Vec<String>, TraceError>;
    fn vehicle_edge(&mut self, vehicle_id: &str) -> Result<String, TraceError>;
    fn vehicle_position(&mut self, vehicle_id: &str) -> Result<(f64, f64), TraceError>;
    /// Per-second emission rate of all vehicles on the edge
    fn edge_pollutant_rate(
        &mut self,
        edge_id: &str,
        pollutant: PollutantType,
    ) -> Result<f64, TraceError>;
    fn advance_step(&mut self) -> Result<(), TraceError>;
    /// Vehicles loaded or still expected to enter the network
    fn pending_vehicle_count(&mut self) -> Result<usize, TraceError>;
}

/// Samples edge emission rates from a running simulation once per step
///
/// Each edge is sampled at most once per step, attributed to the first
/// vehicle found on it. Steps before `from` are advanced without sampling.
/// The run ends at `to`; an open-ended run ends once no vehicles remain.
pub struct LiveSamplingSource<C: SimulationConnection> {
    connection: C,
    resolver: EdgeResolver,
    from: SimTime,
    to: Option<SimTime>,
    step_length: SimTime,
    pending: VecDeque<SourceEvent>,
    covered_until: Option<SimTime>,
    finished: bool,
}

impl<C: SimulationConnection> LiveSamplingSource<C> {
    pub fn new(
        mut connection: C,
        resolver: EdgeResolver,
        from: SimTime,
        to: Option<SimTime>,
    ) -> Result<Self, TraceError> {
        let step_length = connection.step_length()?;
        log::info!(
            "🚦 Live sampling from {:.2}s, step length {:.3}s",
            from,
            step_length
        );
        Ok(Self {
            connection,
            resolver,
            from,
            to,
            step_length,
            pending: VecDeque::new(),
            covered_until: None,
            finished: false,
        })
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    fn sample_step(&mut self, now: SimTime) -> Result<(), TraceError> {
        self.pending.push_back(SourceEvent::StepStarted(now));

        let mut seen = HashSet::new();
        for vehicle_id in self.connection.active_vehicle_ids()? {
            let edge = self.connection.vehicle_edge(&vehicle_id)?;
            if !seen.insert(edge.clone()) {
                continue;
            }

            let mut rates = PollutantSums::new();
            for pollutant in PollutantType::all() {
                rates[pollutant] = self.connection.edge_pollutant_rate(&edge, pollutant)?;
            }
            if rates[PollutantType::Fuel] <= 0.0 {
                continue;
            }

            let position = if is_internal(&edge) {
                Some(self.connection.vehicle_position(&vehicle_id)?)
            } else {
                None
            };
            let edge_id = self.resolver.resolve_edge(&edge, position)?;

            self.pending.push_back(SourceEvent::Sample(EmissionSample {
                vehicle_id,
                edge_id,
                timestamp: now,
                quantities: rates.scaled(self.step_length),
            }));
        }
        Ok(())
    }
}

impl<C: SimulationConnection> EmissionSource for LiveSamplingSource<C> {
    fn next_event(&mut self) -> Result<Option<SourceEvent>, TraceError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            let now = self.connection.current_time()?;
            if time_lt(now, self.from) {
                self.connection.advance_step()?;
                continue;
            }
            if let Some(to) = self.to {
                if time_ge(now, to) {
                    self.finished = true;
                    self.covered_until = Some(to);
                    return Ok(None);
                }
            }
            if self.to.is_none() && self.connection.pending_vehicle_count()? == 0 {
                log::info!("🏁 No vehicles left at {:.2}s, stopping", now);
                self.finished = true;
                self.covered_until = Some(now);
                return Ok(None);
            }

            self.sample_step(now)?;
            self.connection.advance_step()?;
        }
    }

    fn range_start(&self) -> Option<SimTime> {
        Some(self.from)
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
