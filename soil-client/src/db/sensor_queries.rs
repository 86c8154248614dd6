use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{ProbeTable, SensorRow};

// NUMERIC columns are cast so they decode as f64 without a decimal crate.
// TIMESTAMPTZ columns are cast to TIMESTAMP in the session zone, which sqlx
// sets to UTC.
fn select_sql(table: &ProbeTable) -> String {
    format!(
        r#"
        SELECT
            "timestamp"::timestamp AS "timestamp",
            water_content::float8 AS water_content,
            soil_temp::float8     AS soil_temp,
            bulk_ec::float8       AS bulk_ec
        FROM {table}
        ORDER BY "timestamp" ASC
        "#
    )
}

/// Fetch every row of one probe table, oldest first.
pub async fn probe_rows(pool: &PgPool, table: &ProbeTable) -> Result<Vec<SensorRow>> {
    let sql = select_sql(table);
    let rows = sqlx::query_as::<_, SensorRow>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_sql_targets_validated_table_in_time_order() {
        let table = ProbeTable::new("public.port2").unwrap();

        let sql = select_sql(&table);
        assert!(sql.contains("FROM public.port2"));
        assert!(sql.contains("ORDER BY \"timestamp\" ASC"));
        assert!(sql.contains("water_content::float8 AS water_content"));
        assert!(sql.contains("\"timestamp\"::timestamp AS \"timestamp\""));
    }
}
