//! Emission Runtime
//!
//! Replays a SUMO emission trace, maps it onto the reference street network
//! and writes windowed per-segment totals to SQLite or JSONL.
//!
//! Usage:
//!   cargo run --release --bin emission_runtime
//!
//! Configuration is read from the environment (or `.env`); see
//! `sumoflow::config` for the full list of variables.

use dotenv::dotenv;
use log::{info, warn};
use std::io::Write;
use sumoflow::sink::{PersistenceSink, SinkBackend};
use sumoflow::spatial::{load_reference_segments, EdgeToSegmentMap, RoadNetwork};
use sumoflow::trace::{read_trace_head, EdgeResolver, FileReplaySource};
use sumoflow::{EmissionEngine, EngineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let config = EngineConfig::from_env()?;

    let env = env_logger::Env::default().default_filter_or(config.rust_log.as_str());
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();

    info!("🚀 Emission Runtime");
    info!("   ├─ Trace: {}", config.trace_file.display());
    info!("   ├─ Network: {}", config.net_file.display());
    info!("   ├─ Reference: {}", config.reference_file.display());
    info!("   ├─ Output: {} ({:?})", config.output.display(), config.backend);
    info!(
        "   └─ Pollutants: {}",
        config
            .pollutants
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // window errors surface before the trace is split or replayed
    let head = read_trace_head(&config.trace_file)?;
    config.run.validate_for_trace(&head, config.step_length)?;

    let network = RoadNetwork::load(&config.net_file)?;
    let segments = load_reference_segments(&config.reference_file)?;
    let map = EdgeToSegmentMap::build(network.edges(), &segments)?;
    let resolver = EdgeResolver::new(network);

    let mut source = FileReplaySource::open(&config.trace_file, config.replay_options(), resolver)?;

    let backend = SinkBackend::open(config.backend, &config.output, &config.pollutants)?;
    let sink = PersistenceSink::new(backend, config.flush_rows);
    let mut engine = EmissionEngine::new(map, sink, config.run.window_length);

    let result = engine.run(&mut source);

    if !config.keep_chunks {
        for chunk in source.chunks() {
            if let Err(e) = std::fs::remove_file(&chunk.path) {
                warn!("⚠️  Could not remove trace chunk {}: {}", chunk.path.display(), e);
            }
        }
    }

    let summary = result?;
    info!(
        "✅ Wrote {} aggregates over {} windows to {}",
        summary.aggregates,
        summary.windows,
        config.output.display()
    );
    Ok(())
}
