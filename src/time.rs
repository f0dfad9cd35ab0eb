//! Simulation time helpers: literal parsing, window labels, tolerant comparison
//!
//! Simulation time is carried as `f64` seconds. SUMO writes times with two
//! decimals (`"12.00"`), so equality is always checked within [`TIME_EPSILON`].

use thiserror::Error;

pub type SimTime = f64;

/// Tolerance for comparing two simulation times
pub const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum TimeLiteralError {
    #[error("empty time literal")]
    Empty,
    #[error("time literal '{0}' has more than three units (expected H:M:S)")]
    TooManyUnits(String),
    #[error("time literal '{literal}' has an invalid unit '{unit}'")]
    InvalidUnit { literal: String, unit: String },
    #[error("time literal '{0}' is negative")]
    Negative(String),
}

/// Parse a configuration time literal into seconds
///
/// Accepts a raw seconds value (`"7200"`, `"0.5"`) or colon-separated units
/// read from the right as seconds, minutes, hours (`"1:30:00"` = 5400,
/// `"2:30"` = 150). Hours may exceed 23. Only the last unit may be fractional.
pub fn parse_time_literal(literal: &str) -> Result<SimTime, TimeLiteralError> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return Err(TimeLiteralError::Empty);
    }

    let units: Vec<&str> = trimmed.split(':').collect();
    if units.len() > 3 {
        return Err(TimeLiteralError::TooManyUnits(trimmed.to_string()));
    }

    let invalid = |unit: &str| TimeLiteralError::InvalidUnit {
        literal: trimmed.to_string(),
        unit: unit.to_string(),
    };

    let mut total = 0.0;
    let last = units.len() - 1;
    for (i, unit) in units.iter().enumerate() {
        let unit = unit.trim();
        if unit.starts_with('-') {
            return Err(TimeLiteralError::Negative(trimmed.to_string()));
        }
        let value: f64 = if i == last {
            unit.parse().map_err(|_| invalid(unit))?
        } else {
            unit.parse::<u64>().map_err(|_| invalid(unit))? as f64
        };
        if !value.is_finite() {
            return Err(invalid(unit));
        }
        // each additional unit multiplies what came before it
        total = total * 60.0 + value;
    }

    Ok(total)
}

/// `H:MM:SS.ss`, the format used in window column labels
pub fn format_clock(time: SimTime) -> String {
    // round once, before splitting into units
    let centis = (time * 100.0).round() as u64;
    let seconds = centis % 6000;
    format!(
        "{}:{:02}:{:02}.{:02}",
        centis / 360_000,
        (centis / 6000) % 60,
        seconds / 100,
        seconds % 100
    )
}

/// Column label for a window, e.g. `0:00:00.00-0:15:00.00`
pub fn window_label(start: SimTime, end: SimTime) -> String {
    format!("{}-{}", format_clock(start), format_clock(end))
}

/// End of a run's time range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeEnd {
    /// Until the trace or simulation runs out
    ToEnd,
    /// Absolute exclusive end time
    Until(SimTime),
    /// Exclusive end relative to the range start
    Duration(SimTime),
}

impl RangeEnd {
    pub fn resolve(&self, from: SimTime) -> Option<SimTime> {
        match self {
            RangeEnd::ToEnd => None,
            RangeEnd::Until(to) => Some(*to),
            RangeEnd::Duration(duration) => Some(from + duration),
        }
    }
}

pub fn time_eq(a: SimTime, b: SimTime) -> bool {
    (a - b).abs() < TIME_EPSILON
}

/// `a >= b` within tolerance
pub fn time_ge(a: SimTime, b: SimTime) -> bool {
    a > b - TIME_EPSILON
}

/// `a < b` within tolerance
pub fn time_lt(a: SimTime, b: SimTime) -> bool {
    !time_ge(a, b)
}
