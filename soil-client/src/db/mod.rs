pub mod sensor_queries;

pub use sensor_queries::probe_rows;
