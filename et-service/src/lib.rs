pub mod align;
pub mod api;
pub mod bucket;
pub mod config;
pub mod error;
pub mod et;
pub mod features;
pub mod observability;
pub mod reading;
pub mod service;
pub mod soil;
pub mod store;
pub mod timestamp;

pub use error::EtError;
pub use service::EtService;
