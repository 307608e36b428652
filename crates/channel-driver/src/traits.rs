use crate::{ChannelRecord, Result};
use std::collections::BTreeSet;

/// A blocking device driver.
///
/// Implementations are not required to be thread-safe beyond `Send`; callers serialize
/// access to one driver instance.
pub trait Driver: Send {
    /// Short driver kind, e.g. "loopback".
    fn kind(&self) -> &'static str;

    /// Read every named channel in one round trip.
    ///
    /// Per-channel problems are reported through the record status. An `Err` means the
    /// whole batch failed (connection lost) and no record is valid.
    fn read(&mut self, names: &BTreeSet<String>) -> Result<Vec<ChannelRecord>>;

    /// Write the value carried by each record and update the record status in place.
    fn write(&mut self, records: &mut [ChannelRecord]) -> Result<()>;

    /// Bind a reusable read over a fixed, ordered channel list.
    ///
    /// No I/O is expected here; drivers may pre-resolve addressing for the channel set.
    fn prepare_read(&mut self, names: &[String]) -> Result<Box<dyn PreparedRead>>;
}

/// A reusable read produced by [`Driver::prepare_read`].
///
/// `execute` may hand back the same record instances on every call. Records returned
/// here must not be modified while the prepared read is open.
pub trait PreparedRead: Send {
    /// Refresh all records. Records keep the order given to `prepare_read`.
    fn execute(&mut self) -> Result<&[ChannelRecord]>;

    /// Records as of the last `execute`, without I/O.
    fn records(&self) -> &[ChannelRecord];

    /// Release driver-side resources. Calling it more than once is allowed.
    fn close(&mut self) -> Result<()>;
}
