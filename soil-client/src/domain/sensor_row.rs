use time::PrimitiveDateTime;

/// One raw row from a probe table.
///
/// Every measurement column is nullable; a sensor fault leaves the column empty
/// while the other columns of the same row may still be populated.
///
/// `timestamp` is UTC wall-clock time; the query casts `TIMESTAMPTZ` columns so
/// both column types decode here.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SensorRow {
    pub timestamp: PrimitiveDateTime,
    pub water_content: Option<f64>,
    pub soil_temp: Option<f64>,
    pub bulk_ec: Option<f64>,
}
