pub mod csv_file;
pub mod postgres;

use soil_client::{ProbeTable, SensorRow};

pub use csv_file::CsvReadingStore;
pub use postgres::PgReadingStore;

/// Where raw probe rows come from.
///
/// Implementations return rows ordered by timestamp; an empty vector means the
/// table holds no data. Connection and query failures are returned unchanged.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn probe_rows(&self, table: &ProbeTable) -> anyhow::Result<Vec<SensorRow>>;
}
