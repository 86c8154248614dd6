#[derive(thiserror::Error, Debug)]
pub enum EtError {
    /// Unknown soil type, bad probe weights or an unknown probe name.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The store returned no rows; nothing is derived.
    #[error("no data available: {0}")]
    DataUnavailable(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// A request parameter outside its accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("upstream error: {0}")]
    Upstream(#[from] anyhow::Error),
}

pub type Result<T, E = EtError> = std::result::Result<T, E>;
