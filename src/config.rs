//! Runtime configuration from environment variables
//!
//! Environment variables:
//! - `EMISSION_TRACE_FILE`, `EMISSION_NET_FILE`, `EMISSION_REFERENCE_FILE` (required, must exist)
//! - `EMISSION_OUTPUT` (default: emissions.db; output directory for JSONL)
//! - `EMISSION_BACKEND` (`sqlite` | `jsonl`, default: sqlite)
//! - `EMISSION_TYPES` (comma-separated pollutants, default: all)
//! - `EMISSION_FROM` (default: first snapshot of the trace)
//! - `EMISSION_TO_END`, then `EMISSION_DURATION`, then `EMISSION_TO` (default: to end)
//! - `EMISSION_WINDOW` (default: the whole range)
//! - `EMISSION_STEP_LENGTH` (default: inferred from the trace)
//! - `EMISSION_SAFE_PARSE_BYTES` (default: 2^28), `EMISSION_CHUNK_BYTES` (default: 2^27)
//! - `EMISSION_CHUNK_DIR` (default: splitEmission), `EMISSION_KEEP_CHUNKS` (default: false)
//! - `EMISSION_FLUSH_ROWS` (default: 100)
//!
//! All time values accept raw seconds or `H:M:S` literals.

use crate::pollutant::{parse_pollutant_list, PollutantType};
use crate::sink::DEFAULT_FLUSH_ROWS;
use crate::time::{parse_time_literal, RangeEnd, SimTime, TimeLiteralError, TIME_EPSILON};
use crate::trace::splitter::{DEFAULT_CHUNK_BYTES, DEFAULT_CHUNK_DIR, DEFAULT_SAFE_PARSE_BYTES};
use crate::trace::{ReplayOptions, TraceHead};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Sqlite,
    Jsonl,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("{var}: {source}")]
    InvalidTime {
        var: String,
        #[source]
        source: TimeLiteralError,
    },
    #[error("unknown pollutant type '{0}'")]
    InvalidPollutant(String),
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("inconsistent window parameters: {0}")]
    InconsistentWindow(String),
}

/// Requested time range and window length of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunWindow {
    pub from: Option<SimTime>,
    pub end: RangeEnd,
    /// Window length; `None` aggregates the whole range into one window
    pub window_length: Option<SimTime>,
}

impl Default for RunWindow {
    fn default() -> Self {
        Self {
            from: None,
            end: RangeEnd::ToEnd,
            window_length: None,
        }
    }
}

impl RunWindow {
    /// Check the window against the range starting at `from`
    ///
    /// Returns the effective window length: the configured one, the range
    /// length when unset, or infinity for an open-ended run without one.
    pub fn validate(
        &self,
        from: SimTime,
        step_length: Option<SimTime>,
    ) -> Result<SimTime, ConfigError> {
        if from < 0.0 {
            return Err(ConfigError::InconsistentWindow(format!("start {} is negative", from)));
        }
        let range = match self.end.resolve(from) {
            Some(to) if to <= from + TIME_EPSILON => {
                return Err(ConfigError::InconsistentWindow(format!(
                    "end {} is not after start {}",
                    to, from
                )));
            }
            Some(to) => Some(to - from),
            None => None,
        };

        let window = match (self.window_length, range) {
            (Some(window), _) => window,
            (None, Some(range)) => range,
            (None, None) => return Ok(SimTime::INFINITY),
        };

        if !(window > 0.0) || !window.is_finite() {
            return Err(ConfigError::InconsistentWindow(format!(
                "window length {} must be positive",
                window
            )));
        }
        if let Some(range) = range {
            if window > range + TIME_EPSILON {
                return Err(ConfigError::InconsistentWindow(format!(
                    "window length {} exceeds the range length {}",
                    window, range
                )));
            }
            if !is_multiple(range, window) {
                return Err(ConfigError::InconsistentWindow(format!(
                    "window length {} does not divide the range length {}",
                    window, range
                )));
            }
        }
        if let Some(step) = step_length {
            if !is_multiple(window, step) {
                return Err(ConfigError::InconsistentWindow(format!(
                    "window length {} is not a multiple of the step length {}",
                    window, step
                )));
            }
        }
        Ok(window)
    }

    /// Validate against the head of the trace before any of it is replayed
    ///
    /// An unset start falls back to the first snapshot and an unset step
    /// length to the spacing of the first two. Returns `None` for an empty
    /// trace without an explicit start.
    pub fn validate_for_trace(
        &self,
        head: &TraceHead,
        step_length: Option<SimTime>,
    ) -> Result<Option<SimTime>, ConfigError> {
        let Some(from) = self.from.or(head.first_time) else {
            return Ok(None);
        };
        self.validate(from, step_length.or(head.step_length)).map(Some)
    }

    /// Checks possible before the trace has been opened
    fn validate_early(&self, step_length: Option<SimTime>) -> Result<(), ConfigError> {
        match (self.from, self.end) {
            (Some(from), _) => self.validate(from, step_length).map(|_| ()),
            // the range length is known without a start
            (None, RangeEnd::Duration(_)) | (None, RangeEnd::ToEnd) => {
                self.validate(0.0, step_length).map(|_| ())
            }
            (None, RangeEnd::Until(_)) => match self.window_length {
                Some(window) if !(window > 0.0) || !window.is_finite() => {
                    Err(ConfigError::InconsistentWindow(format!(
                        "window length {} must be positive",
                        window
                    )))
                }
                _ => Ok(()),
            },
        }
    }
}

fn is_multiple(value: f64, unit: f64) -> bool {
    let ratio = value / unit;
    (ratio - ratio.round()).abs() < 1e-6
}

/// Configuration for the emission runtime
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub trace_file: PathBuf,
    pub net_file: PathBuf,
    pub reference_file: PathBuf,
    pub output: PathBuf,
    pub backend: BackendType,
    pub pollutants: Vec<PollutantType>,
    pub run: RunWindow,
    pub step_length: Option<SimTime>,
    pub safe_parse_bytes: u64,
    pub chunk_bytes: u64,
    pub chunk_dir: PathBuf,
    pub keep_chunks: bool,
    pub flush_rows: usize,
    pub rust_log: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let trace_file = required_file("EMISSION_TRACE_FILE")?;
        let net_file = required_file("EMISSION_NET_FILE")?;
        let reference_file = required_file("EMISSION_REFERENCE_FILE")?;

        let output = PathBuf::from(
            env::var("EMISSION_OUTPUT").unwrap_or_else(|_| "emissions.db".to_string()),
        );

        let backend = match env::var("EMISSION_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => BackendType::Sqlite,
            "jsonl" => BackendType::Jsonl,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "EMISSION_BACKEND must be sqlite or jsonl, got '{}'",
                    other
                )))
            }
        };

        let pollutants = match env::var("EMISSION_TYPES") {
            Ok(list) => parse_pollutant_list(&list).map_err(ConfigError::InvalidPollutant)?,
            Err(_) => PollutantType::all().to_vec(),
        };
        if pollutants.is_empty() {
            return Err(ConfigError::InvalidValue("EMISSION_TYPES lists no pollutant".to_string()));
        }

        let from = time_var("EMISSION_FROM")?;
        let end = if flag_var("EMISSION_TO_END")? {
            RangeEnd::ToEnd
        } else if let Some(duration) = time_var("EMISSION_DURATION")? {
            RangeEnd::Duration(duration)
        } else if let Some(to) = time_var("EMISSION_TO")? {
            RangeEnd::Until(to)
        } else {
            RangeEnd::ToEnd
        };
        let run = RunWindow {
            from,
            end,
            window_length: time_var("EMISSION_WINDOW")?,
        };

        let step_length = time_var("EMISSION_STEP_LENGTH")?;
        if let Some(step) = step_length {
            if !(step > 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "EMISSION_STEP_LENGTH must be positive, got {}",
                    step
                )));
            }
        }
        run.validate_early(step_length)?;

        Ok(Self {
            trace_file,
            net_file,
            reference_file,
            output,
            backend,
            pollutants,
            run,
            step_length,
            safe_parse_bytes: number_var("EMISSION_SAFE_PARSE_BYTES", DEFAULT_SAFE_PARSE_BYTES)?,
            chunk_bytes: number_var("EMISSION_CHUNK_BYTES", DEFAULT_CHUNK_BYTES)?,
            chunk_dir: PathBuf::from(
                env::var("EMISSION_CHUNK_DIR").unwrap_or_else(|_| DEFAULT_CHUNK_DIR.to_string()),
            ),
            keep_chunks: flag_var("EMISSION_KEEP_CHUNKS")?,
            flush_rows: number_var("EMISSION_FLUSH_ROWS", DEFAULT_FLUSH_ROWS)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            from: self.run.from,
            end: self.run.end,
            step_length: self.step_length,
            safe_parse_bytes: self.safe_parse_bytes,
            chunk_bytes: self.chunk_bytes,
            chunk_dir: self.chunk_dir.clone(),
        }
    }
}

fn required_file(var: &str) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(
        env::var(var).map_err(|_| ConfigError::MissingVariable(var.to_string()))?,
    );
    if !path.exists() {
        return Err(ConfigError::MissingFile(path));
    }
    Ok(path)
}

fn time_var(var: &str) -> Result<Option<SimTime>, ConfigError> {
    match env::var(var) {
        Ok(value) => parse_time_literal(&value)
            .map(Some)
            .map_err(|source| ConfigError::InvalidTime {
                var: var.to_string(),
                source,
            }),
        Err(_) => Ok(None),
    }
}

fn flag_var(var: &str) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(ConfigError::InvalidValue(format!(
                "{} must be a boolean, got '{}'",
                var, other
            ))),
        },
        Err(_) => Ok(false),
    }
}

fn number_var<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| {
                ConfigError::InvalidValue(format!("{} must be a number, got '{}'", var, value))
            }),
        Err(_) => Ok(default),
    }
}
