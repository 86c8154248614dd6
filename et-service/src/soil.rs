use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EtError;

/// Soil classes with a known water-retention correction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoilType {
    /// Low water retention.
    Podzols,
    /// High water retention.
    Gleysols,
    #[default]
    Cambisols,
}

impl SoilType {
    pub const ALL: [SoilType; 3] = [SoilType::Podzols, SoilType::Gleysols, SoilType::Cambisols];

    /// Multiplicative correction applied to the weighted moisture change.
    pub fn correction_factor(self) -> f64 {
        match self {
            SoilType::Podzols => 1.1,
            SoilType::Gleysols => 0.9,
            SoilType::Cambisols => 1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SoilType::Podzols => "Podzols",
            SoilType::Gleysols => "Gleysols",
            SoilType::Cambisols => "Cambisols",
        }
    }
}

impl fmt::Display for SoilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SoilType {
    type Err = EtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SoilType::ALL
            .into_iter()
            .find(|soil| soil.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EtError::Configuration(format!("unknown soil type '{wanted}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!("podzols".parse::<SoilType>().unwrap(), SoilType::Podzols);
        assert_eq!(" Gleysols ".parse::<SoilType>().unwrap(), SoilType::Gleysols);
        assert_eq!("CAMBISOLS".parse::<SoilType>().unwrap(), SoilType::Cambisols);
    }

    #[test]
    fn unknown_soil_fails_instead_of_defaulting() {
        let err = "Vertisols".parse::<SoilType>().unwrap_err();
        assert!(matches!(err, EtError::Configuration(ref m) if m.contains("Vertisols")));
    }

    #[test]
    fn factors_are_ordered_by_retention() {
        assert!(SoilType::Podzols.correction_factor() > SoilType::Cambisols.correction_factor());
        assert!(SoilType::Cambisols.correction_factor() > SoilType::Gleysols.correction_factor());
        assert!(SoilType::ALL.iter().all(|s| s.correction_factor() > 0.0));
    }
}
