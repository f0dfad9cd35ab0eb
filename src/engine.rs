//! Emission engine: drives one run from a trace source into a persistence sink
//!
//! ```text
//! EmissionSource ──next_event()──▶ TimeWindowAccumulator ──ClosedWindow──▶ PersistenceSink
//!                                        │
//!                                 EdgeToSegmentMap
//! ```
//!
//! All per-run state lives in [`EmissionEngine`]; nothing is global.

use crate::config::{ConfigError, RunWindow};
use crate::sink::{PersistenceSink, SinkError, StorageBackend};
use crate::spatial::{EdgeToSegmentMap, LoadError, MappingError};
use crate::time::{window_label, RangeEnd, SimTime};
use crate::trace::{EmissionSource, SourceEvent, TraceError};
use crate::window::{ClosedWindow, TimeWindowAccumulator};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub samples: u64,
    pub windows: usize,
    pub aggregates: usize,
}

pub struct EmissionEngine<B: StorageBackend> {
    map: EdgeToSegmentMap,
    sink: PersistenceSink<B>,
    window_length: Option<SimTime>,
}

impl<B: StorageBackend> EmissionEngine<B> {
    /// `window_length` of `None` aggregates the whole range into one window
    pub fn new(
        map: EdgeToSegmentMap,
        sink: PersistenceSink<B>,
        window_length: Option<SimTime>,
    ) -> Self {
        Self {
            map,
            sink,
            window_length,
        }
    }

    pub fn map(&self) -> &EdgeToSegmentMap {
        &self.map
    }

    pub fn sink(&self) -> &PersistenceSink<B> {
        &self.sink
    }

    pub fn into_backend(self) -> Result<B, EngineError> {
        Ok(self.sink.into_backend()?)
    }

    /// Consume `source` to its end, persisting every closed window
    ///
    /// On error the open window is discarded, aggregates of already closed
    /// windows are still flushed, and the original error is returned.
    pub fn run<S: EmissionSource>(&mut self, source: &mut S) -> Result<RunSummary, EngineError> {
        match self.drive(source) {
            Ok(summary) => {
                self.sink.close()?;
                log::info!(
                    "✅ Run complete: {} steps, {} samples, {} windows, {} aggregates ({} batches)",
                    summary.steps,
                    summary.samples,
                    summary.windows,
                    summary.aggregates,
                    self.sink.batches_written()
                );
                Ok(summary)
            }
            Err(err) => {
                log::error!("❌ Run aborted: {}", err);
                if let Err(close_err) = self.sink.close() {
                    log::error!("❌ Final flush after abort failed: {}", close_err);
                }
                Err(err)
            }
        }
    }

    fn drive<S: EmissionSource>(&mut self, source: &mut S) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();
        let Some(from) = source.range_start() else {
            log::warn!("⚠️  Source has no snapshots, nothing to aggregate");
            return Ok(summary);
        };

        let run = RunWindow {
            from: Some(from),
            end: source.range_end().map_or(RangeEnd::ToEnd, RangeEnd::Until),
            window_length: self.window_length,
        };
        let window_length = run.validate(from, source.step_length())?;
        log::info!(
            "🚀 Aggregating from {:.2}s in windows of {}s",
            from,
            window_length
        );

        let mut accumulator = TimeWindowAccumulator::new(from, window_length);
        while let Some(event) = source.next_event()? {
            match event {
                SourceEvent::StepStarted(time) => {
                    summary.steps += 1;
                    for closed in accumulator.tick(time) {
                        self.persist(closed, &mut summary)?;
                    }
                }
                SourceEvent::Sample(sample) => {
                    summary.samples += 1;
                    for closed in accumulator.tick(sample.timestamp) {
                        self.persist(closed, &mut summary)?;
                    }
                    accumulator.absorb(&sample, &self.map)?;
                }
            }
        }

        if let Some(end) = source.covered_until() {
            for closed in accumulator.finish(end) {
                self.persist(closed, &mut summary)?;
            }
        }
        Ok(summary)
    }

    fn persist(
        &mut self,
        closed: ClosedWindow,
        summary: &mut RunSummary,
    ) -> Result<(), EngineError> {
        log::info!(
            "🪟 Window {} closed with {} segments",
            window_label(closed.start, closed.end),
            closed.aggregates.len()
        );
        summary.windows += 1;
        for aggregate in closed.aggregates {
            self.sink.enqueue(aggregate)?;
            summary.aggregates += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pollutant::{PollutantSums, PollutantType};
    use crate::sink::MemoryBackend;
    use crate::spatial::{NetworkEdge, Polyline, ReferenceSegment};
    use crate::trace::EmissionSample;
    use std::collections::VecDeque;

    /// Source replaying a fixed event list
    struct ScriptedSource {
        events: VecDeque<Result<SourceEvent, TraceError>>,
        from: Option<SimTime>,
        to: Option<SimTime>,
        covered_until: Option<SimTime>,
        end: Option<SimTime>,
    }

    impl ScriptedSource {
        fn steps(from: SimTime, samples: Vec<(SimTime, &str, f64)>, end: SimTime) -> Self {
            let mut events = VecDeque::new();
            let mut last = None;
            for (time, edge, fuel) in samples {
                if last != Some(time) {
                    events.push_back(Ok(SourceEvent::StepStarted(time)));
                    last = Some(time);
                }
                let mut quantities = PollutantSums::new();
                quantities[PollutantType::Fuel] = fuel;
                events.push_back(Ok(SourceEvent::Sample(EmissionSample {
                    vehicle_id: "v0".to_string(),
                    edge_id: edge.to_string(),
                    timestamp: time,
                    quantities,
                })));
            }
            Self {
                events,
                from: Some(from),
                to: Some(end),
                covered_until: None,
                end: Some(end),
            }
        }
    }

    impl EmissionSource for ScriptedSource {
        fn next_event(&mut self) -> Result<Option<SourceEvent>, TraceError> {
            match self.events.pop_front() {
                Some(event) => event.map(Some),
                None => {
                    self.covered_until = self.end;
                    Ok(None)
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
            Some(1.0)
        }
    }

    fn map() -> EdgeToSegmentMap {
        EdgeToSegmentMap::build(
            &[
                NetworkEdge::new("E1", Polyline::new(vec![[0.0, 0.0], [10.0, 0.0]])),
                NetworkEdge::new("E2", Polyline::new(vec![[100.0, 0.0], [110.0, 0.0]])),
            ],
            &[
                ReferenceSegment::new("west", Polyline::new(vec![[0.0, 1.0], [10.0, 1.0]])),
                ReferenceSegment::new("east", Polyline::new(vec![[100.0, 1.0], [110.0, 1.0]])),
            ],
        )
        .unwrap()
    }

    fn engine(window: Option<SimTime>, flush_rows: usize) -> EmissionEngine<MemoryBackend> {
        EmissionEngine::new(map(), PersistenceSink::new(MemoryBackend::new(), flush_rows), window)
    }

    #[test]
    fn test_windows_persisted_in_order() {
        let mut engine = engine(Some(2.0), 100);
        let mut source = ScriptedSource::steps(
            0.0,
            vec![(0.0, "E1", 1.0), (1.0, "E2", 1.0), (2.0, "E1", 3.0), (3.0, "E1", 1.0)],
            4.0,
        );

        let summary = engine.run(&mut source).unwrap();
        assert_eq!(summary.windows, 2);
        assert_eq!(summary.aggregates, 3);
        assert_eq!(summary.samples, 4);

        let backend = engine.into_backend().unwrap();
        let rows: Vec<_> = backend
            .rows()
            .map(|r| (r.segment_id.as_str(), r.window_start, r.sums[PollutantType::Fuel]))
            .collect();
        assert_eq!(rows, vec![("east", 0.0, 1.0), ("west", 0.0, 1.0), ("west", 2.0, 4.0)]);
    }

    #[test]
    fn test_error_discards_open_window_but_flushes_closed() {
        let mut engine = engine(Some(2.0), 100);
        let mut source = ScriptedSource::steps(0.0, vec![(0.0, "E1", 1.0), (2.0, "E1", 5.0)], 4.0);
        source
            .events
            .push_back(Err(TraceError::MissingTimestep { time: 3.0 }));

        let err = engine.run(&mut source).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Trace(TraceError::MissingTimestep { time }) if time == 3.0
        ));

        let backend = engine.into_backend().unwrap();
        let rows: Vec<_> = backend.rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].window_start, 0.0);
    }

    #[test]
    fn test_unmapped_edge_is_fatal() {
        let mut engine = engine(Some(2.0), 100);
        let mut source = ScriptedSource::steps(0.0, vec![(0.0, "E9", 1.0)], 2.0);

        assert!(matches!(
            engine.run(&mut source),
            Err(EngineError::Mapping(MappingError::UnmappedEdge(edge))) if edge == "E9"
        ));
    }

    #[test]
    fn test_window_checked_against_source_range() {
        let mut engine = engine(Some(3.0), 100);
        let mut source = ScriptedSource::steps(0.0, vec![(0.0, "E1", 1.0)], 4.0);

        assert!(matches!(
            engine.run(&mut source),
            Err(EngineError::Config(ConfigError::InconsistentWindow(_)))
        ));
        assert_eq!(engine.sink().rows_written(), 0);
    }

    #[test]
    fn test_empty_source() {
        let mut engine = engine(None, 100);
        let mut source = ScriptedSource::steps(0.0, vec![], 4.0);
        source.from = None;

        assert_eq!(engine.run(&mut source).unwrap(), RunSummary::default());
    }
}
