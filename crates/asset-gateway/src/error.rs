use channel_driver::{ChannelStatus, DriverError};
use thiserror::Error;

use crate::ConversionError;

pub type Result<T, E = AccessError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed value, unknown type tag or a value the channel cannot take.
    #[error("validation error: {0}")]
    Validation(String),
    /// Transport or hardware failure inside a driver call.
    #[error("connection error: {0}")]
    Connection(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Misuse of the API, such as executing a closed plan.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// FAILURE status for one channel, with the error class leading the message.
    pub fn to_status(&self) -> ChannelStatus {
        ChannelStatus::failure(self.to_string())
    }
}

impl From<DriverError> for AccessError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Connection(msg) => Self::Connection(msg),
            DriverError::Closed => Self::Internal("driver prepared read is closed".to_string()),
        }
    }
}

impl From<ConversionError> for AccessError {
    fn from(e: ConversionError) -> Self {
        Self::Validation(e.to_string())
    }
}
