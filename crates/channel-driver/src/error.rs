use thiserror::Error;

pub type Result<T, E = DriverError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DriverError {
    /// The link to the field device is down; the whole call failed.
    #[error("connection error: {0}")]
    Connection(String),
    #[error("prepared read is closed")]
    Closed,
}

impl DriverError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
