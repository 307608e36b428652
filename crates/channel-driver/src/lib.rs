//! channel-driver: the contract between the gateway and device drivers
//!
//! This crate defines the value and record types exchanged with field devices and the
//! blocking [`Driver`] / [`PreparedRead`] traits that device-specific backends implement.
//! The default build enables a `loopback` backend that keeps written values in memory so
//! gateways and tests can run without hardware.

mod types;
pub use types::{
    now_millis, ChannelDirection, ChannelFlag, ChannelRecord, ChannelStatus, DataType, TypedValue,
};

mod error;
pub use error::{DriverError, Result};

mod traits;
pub use traits::{Driver, PreparedRead};

#[cfg(feature = "loopback")]
mod loopback;

#[cfg(feature = "loopback")]
pub use loopback::{LoopbackDriver, LoopbackHandle, LoopbackPreparedRead};
