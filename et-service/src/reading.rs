use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use soil_client::SensorRow;
use time::Date;

use crate::timestamp::Timestamp;

/// Anything positioned on the reading timeline.
pub trait Timestamped {
    fn timestamp(&self) -> Timestamp;

    fn date(&self) -> Date {
        self.timestamp().date()
    }
}

/// One probe reading at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: Timestamp,
    pub water_content: Option<f64>,
    pub soil_temp: Option<f64>,
    pub bulk_ec: Option<f64>,
}

impl Reading {
    pub fn water_content(timestamp: Timestamp, water_content: Option<f64>) -> Self {
        Self {
            timestamp,
            water_content,
            soil_temp: None,
            bulk_ec: None,
        }
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

impl From<SensorRow> for Reading {
    fn from(row: SensorRow) -> Self {
        Reading {
            timestamp: Timestamp::from(row.timestamp),
            water_content: finite(row.water_content),
            soil_temp: finite(row.soil_temp),
            bulk_ec: finite(row.bulk_ec),
        }
    }
}

impl Timestamped for Reading {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Sort readings chronologically and drop repeated timestamps.
///
/// The first reading seen for a timestamp wins.
pub fn order_readings(mut readings: Vec<Reading>) -> Vec<Reading> {
    readings.sort_by_key(|r| r.timestamp);
    let before = readings.len();
    readings.dedup_by_key(|r| r.timestamp);
    let dropped = before - readings.len();
    if dropped > 0 {
        tracing::warn!(dropped, "duplicate reading timestamps dropped");
    }
    readings
}

/// Base-probe timestamp plus one water content per participating probe.
///
/// Serialises as `{"timestamp": .., "p1": .., "p2": .., ...}`; absent values
/// are written as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedReading {
    pub timestamp: Timestamp,
    pub values: Vec<Option<f64>>,
}

impl JoinedReading {
    pub fn probe_key(index: usize) -> String {
        format!("p{}", index + 1)
    }
}

impl Timestamped for JoinedReading {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Serialize for JoinedReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        for (i, v) in self.values.iter().enumerate() {
            map.serialize_entry(&Self::probe_key(i), v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedPoint {
    pub timestamp: Timestamp,
    pub et: f64,
}

impl Timestamped for DerivedPoint {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// ET for a same-day pair, with the date and time split out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEtPoint {
    pub timestamp: Timestamp,
    pub date: String,
    pub time: String,
    pub et: f64,
}

impl Timestamped for DailyEtPoint {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
