//! asset-gateway: remote read/write access to device channels
//!
//! The [`RequestRouter`] maps an address below the resource root to one of four
//! operations: list devices, list a device's channels, batch read, single write. Channel
//! I/O goes through the [`ChannelExecutor`], which reports failures per channel and turns
//! connection loss into a whole-batch error for reads and a FAILURE record for writes.
//! [`PreparedReadPlan`] binds a fixed channel set for repeated low-overhead reads.

mod error;
pub use error::{AccessError, Result};

pub mod convert;
pub use convert::{convert, create_write_record, parse_data_type, ConversionError};

mod executor;
pub use executor::ChannelExecutor;

mod prepared;
pub use prepared::PreparedReadPlan;

mod payload;
pub use payload::{Metric, ResponsePayload};

mod router;
pub use router::{Address, RequestKind, RequestRouter, WritePayload};
