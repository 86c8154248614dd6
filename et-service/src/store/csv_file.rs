use std::{fs::File, path::PathBuf};

use anyhow::{anyhow, Context};
use csv::StringRecord;
use soil_client::{ProbeTable, SensorRow};

use super::ReadingStore;
use crate::timestamp::Timestamp;

/// Probe tables exported as CSV, one `<table>.csv` file per probe.
///
/// Expected header columns (by name):
/// - timestamp (`YYYY-MM-DD HH:MM:SS` or RFC3339)
/// - water_content (optional)
/// - soil_temp (optional)
/// - bulk_ec (optional)
///
/// Blank or non-numeric measurement cells, such as unit marker rows, are read
/// as missing values.
pub struct CsvReadingStore {
    dir: PathBuf,
}

impl CsvReadingStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, table: &ProbeTable) -> PathBuf {
        self.dir.join(format!("{}.csv", table.table_name()))
    }
}

fn parse_optional_f64(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        trimmed.parse().ok()
    }
}

fn record_to_row(record: &StringRecord, headers: &StringRecord) -> anyhow::Result<SensorRow> {
    let get = |name: &str| -> Option<&str> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
    };

    let ts_str = get("timestamp").ok_or_else(|| anyhow!("missing column 'timestamp' in CSV record"))?;
    let timestamp: Timestamp = ts_str
        .parse()
        .with_context(|| format!("invalid timestamp '{ts_str}'"))?;

    Ok(SensorRow {
        timestamp: timestamp.datetime(),
        water_content: get("water_content").and_then(parse_optional_f64),
        soil_temp: get("soil_temp").and_then(parse_optional_f64),
        bulk_ec: get("bulk_ec").and_then(parse_optional_f64),
    })
}

fn read_rows(path: PathBuf) -> anyhow::Result<Vec<SensorRow>> {
    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers().context("failed to read CSV headers")?.clone();

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.context("failed to read CSV record")?;
        let row = record_to_row(&record, &headers)
            .with_context(|| format!("{} record {}", path.display(), line + 1))?;
        rows.push(row);
    }
    rows.sort_by_key(|r| r.timestamp);
    Ok(rows)
}

#[async_trait::async_trait]
impl ReadingStore for CsvReadingStore {
    async fn probe_rows(&self, table: &ProbeTable) -> anyhow::Result<Vec<SensorRow>> {
        let path = self.path_for(table);
        tokio::task::spawn_blocking(move || read_rows(path)).await?
    }
}
