//! Streaming reader for SUMO emission-export traces
//!
//! Reads one `<timestep>` element at a time so memory stays bounded by the
//! size of a single snapshot, not the size of the trace.

use super::TraceError;
use crate::pollutant::{PollutantSums, PollutantType};
use crate::time::SimTime;
use crate::xml;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::io::BufRead;

/// One `<vehicle>` record of a snapshot, emission rates per second
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub id: String,
    pub lane: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub rates: PollutantSums,
}

impl VehicleRecord {
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub time: SimTime,
    pub vehicles: Vec<VehicleRecord>,
}

pub struct SnapshotReader<R: BufRead> {
    reader: XmlReader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> SnapshotReader<R> {
    pub fn new(source: R) -> Self {
        let mut reader = XmlReader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next complete snapshot, or `None` at end of document
    pub fn next_snapshot(&mut self) -> Result<Option<Snapshot>, TraceError> {
        let mut current: Option<Snapshot> = None;

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| TraceError::Xml(e.to_string()))?;

            match event {
                Event::Start(e) if e.name().as_ref() == b"timestep" => {
                    current = Some(Snapshot {
                        time: parse_timestep(&e)?,
                        vehicles: Vec::new(),
                    });
                }
                Event::Empty(e) if e.name().as_ref() == b"timestep" => {
                    return Ok(Some(Snapshot {
                        time: parse_timestep(&e)?,
                        vehicles: Vec::new(),
                    }));
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"vehicle" => {
                    if let Some(snapshot) = current.as_mut() {
                        snapshot.vehicles.push(parse_vehicle(&e)?);
                    }
                }
                Event::End(e) if e.name().as_ref() == b"timestep" => {
                    return match current.take() {
                        Some(snapshot) => Ok(Some(snapshot)),
                        None => Err(TraceError::Malformed(
                            "closing </timestep> without an opening tag".to_string(),
                        )),
                    };
                }
                Event::Eof => {
                    return match current {
                        Some(snapshot) => Err(TraceError::Malformed(format!(
                            "trace ends inside the timestep at {:.2}",
                            snapshot.time
                        ))),
                        None => Ok(None),
                    };
                }
                _ => {}
            }
        }
    }
}

fn parse_timestep(element: &BytesStart<'_>) -> Result<SimTime, TraceError> {
    let time = xml::attribute(element, b"time")
        .map_err(TraceError::Xml)?
        .ok_or_else(|| TraceError::Malformed("timestep without a time attribute".to_string()))?;
    parse_number(&time, "time")
}

fn parse_vehicle(element: &BytesStart<'_>) -> Result<VehicleRecord, TraceError> {
    let attrs = xml::attributes(element).map_err(TraceError::Xml)?;
    let id = required(&attrs, "id")?.to_string();
    let lane = required(&attrs, "lane")?.to_string();

    let mut rates = PollutantSums::new();
    for pollutant in PollutantType::all() {
        let name = pollutant.trace_attribute();
        rates[pollutant] = parse_number(required(&attrs, name)?, name)?;
    }

    Ok(VehicleRecord {
        id,
        lane,
        x: optional_number(&attrs, "x")?,
        y: optional_number(&attrs, "y")?,
        rates,
    })
}

fn required<'a>(attrs: &'a HashMap<String, String>, name: &str) -> Result<&'a str, TraceError> {
    attrs
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| TraceError::Malformed(format!("vehicle record without '{}'", name)))
}

fn optional_number(attrs: &HashMap<String, String>, name: &str) -> Result<Option<f64>, TraceError> {
    attrs.get(name).map(|v| parse_number(v, name)).transpose()
}

fn parse_number(value: &str, name: &str) -> Result<f64, TraceError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| TraceError::Malformed(format!("invalid {} value '{}'", name, value)))
}
