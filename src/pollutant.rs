//! Pollutant types reported by SUMO's emission model

use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PollutantType {
    Fuel,
    CO2,
    CO,
    HC,
    NOx,
    PMx,
}

impl PollutantType {
    pub const COUNT: usize = 6;

    pub fn all() -> [PollutantType; 6] {
        [
            PollutantType::Fuel,
            PollutantType::CO2,
            PollutantType::CO,
            PollutantType::HC,
            PollutantType::NOx,
            PollutantType::PMx,
        ]
    }

    /// Canonical display name, also used as the output table / file prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            PollutantType::Fuel => "Fuel",
            PollutantType::CO2 => "CO2",
            PollutantType::CO => "CO",
            PollutantType::HC => "HC",
            PollutantType::NOx => "NOx",
            PollutantType::PMx => "PMx",
        }
    }

    /// Attribute name on a `<vehicle>` record of an emission-export trace
    pub fn trace_attribute(&self) -> &'static str {
        match self {
            PollutantType::Fuel => "fuel",
            other => other.as_str(),
        }
    }

    /// Case-insensitive lookup (`"nox"`, `"NOx"` and `"NOX"` are the same type)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "fuel" => Some(PollutantType::Fuel),
            "co2" => Some(PollutantType::CO2),
            "co" => Some(PollutantType::CO),
            "hc" => Some(PollutantType::HC),
            "nox" => Some(PollutantType::NOx),
            "pmx" => Some(PollutantType::PMx),
            _ => None,
        }
    }

    fn slot(&self) -> usize {
        match self {
            PollutantType::Fuel => 0,
            PollutantType::CO2 => 1,
            PollutantType::CO => 2,
            PollutantType::HC => 3,
            PollutantType::NOx => 4,
            PollutantType::PMx => 5,
        }
    }
}

impl std::fmt::Display for PollutantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size quantity vector, one slot per pollutant type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutantSums([f64; PollutantType::COUNT]);

impl PollutantSums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = *self;
        for value in out.0.iter_mut() {
            *value *= factor;
        }
        out
    }

}

impl Index<PollutantType> for PollutantSums {
    type Output = f64;

    fn index(&self, pollutant: PollutantType) -> &f64 {
        &self.0[pollutant.slot()]
    }
}

impl IndexMut<PollutantType> for PollutantSums {
    fn index_mut(&mut self, pollutant: PollutantType) -> &mut f64 {
        &mut self.0[pollutant.slot()]
    }
}

impl AddAssign<&PollutantSums> for PollutantSums {
    fn add_assign(&mut self, rhs: &PollutantSums) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0.iter()) {
            *lhs += rhs;
        }
    }
}

/// Parse a comma-separated pollutant list such as `"fuel,CO2,nox"`
///
/// Returns the offending name on failure.
pub fn parse_pollutant_list(list: &str) -> Result<Vec<PollutantType>, String> {
    let mut out = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let pollutant = PollutantType::from_name(name).ok_or_else(|| name.to_string())?;
        if !out.contains(&pollutant) {
            out.push(pollutant);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(PollutantType::from_name("FUEL"), Some(PollutantType::Fuel));
        assert_eq!(PollutantType::from_name("nox"), Some(PollutantType::NOx));
        assert_eq!(PollutantType::from_name(" PMx "), Some(PollutantType::PMx));
        assert_eq!(PollutantType::from_name("SO2"), None);
    }

    #[test]
    fn test_trace_attribute_names() {
        assert_eq!(PollutantType::Fuel.trace_attribute(), "fuel");
        assert_eq!(PollutantType::NOx.trace_attribute(), "NOx");
    }

    #[test]
    fn test_parse_pollutant_list() {
        let list = parse_pollutant_list("fuel, co2,CO2,hc").unwrap();
        assert_eq!(list, vec![PollutantType::Fuel, PollutantType::CO2, PollutantType::HC]);

        assert_eq!(parse_pollutant_list("fuel,lead"), Err("lead".to_string()));
    }

    #[test]
    fn test_sums_accumulate() {
        let mut a = PollutantSums::new();
        a[PollutantType::Fuel] = 1.5;
        let mut b = PollutantSums::new();
        b[PollutantType::Fuel] = 0.5;
        b[PollutantType::CO] = 2.0;

        a += &b;

        assert_eq!(a[PollutantType::Fuel], 2.0);
        assert_eq!(a[PollutantType::CO], 2.0);
        assert_eq!(a.scaled(2.0)[PollutantType::CO], 4.0);
    }
}
