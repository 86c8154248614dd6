mod probe_table;
mod sensor_row;

pub use probe_table::{InvalidTableName, ProbeTable};
pub use sensor_row::SensorRow;
