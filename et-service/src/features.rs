use serde::Serialize;

use crate::{
    reading::{Reading, Timestamped},
    timestamp::Timestamp,
};

/// Inputs a leaf-area-index regression consumes for one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaiFeatures {
    pub timestamp: Timestamp,
    /// Signed water content change versus the previous reading.
    pub moisture_delta: Option<f64>,
    /// `moisture_delta` per elapsed hour.
    pub moisture_rate_per_hour: Option<f64>,
    pub soil_temp: Option<f64>,
    pub bulk_ec: Option<f64>,
}

impl Timestamped for LaiFeatures {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

fn features_for(prev: Option<&Reading>, curr: &Reading) -> LaiFeatures {
    let delta = prev.and_then(|p| Some(curr.water_content? - p.water_content?));
    let hours = prev.map(|p| curr.timestamp.seconds_since(&p.timestamp) / 3600.0);
    let rate = match (delta, hours) {
        (Some(d), Some(h)) if h > 0.0 => Some(d / h),
        _ => None,
    };

    LaiFeatures {
        timestamp: curr.timestamp,
        moisture_delta: delta,
        moisture_rate_per_hour: rate,
        soil_temp: curr.soil_temp,
        bulk_ec: curr.bulk_ec,
    }
}

/// One feature row per reading of an ordered probe stream.
pub fn lai_features(readings: &[Reading]) -> Vec<LaiFeatures> {
    let Some(first) = readings.first() else {
        return Vec::new();
    };

    std::iter::once(features_for(None, first))
        .chain(
            readings
                .windows(2)
                .map(|pair| features_for(Some(&pair[0]), &pair[1])),
        )
        .collect()
}
