use soil_client::{db, ProbeTable, SensorRow};
use sqlx::PgPool;

use super::ReadingStore;

#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn probe_rows(&self, table: &ProbeTable) -> anyhow::Result<Vec<SensorRow>> {
        let rows = db::probe_rows(&self.pool, table).await?;
        tracing::debug!(table = %table, rows = rows.len(), "probe rows fetched");
        Ok(rows)
    }
}
