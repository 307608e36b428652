use crate::{AccessError, PreparedReadPlan, Result};
use asset_registry::{Device, GatewayMetrics};
use channel_driver::{ChannelDirection, ChannelRecord, ChannelStatus};
use std::collections::BTreeSet;
use std::slice;
use std::sync::Arc;

/// Runs channel reads and writes against a device's driver.
#[derive(Clone, Default)]
pub struct ChannelExecutor {
    metrics: Option<GatewayMetrics>,
}

/// FAILURE record for a channel that never reached the driver.
fn rejected(name: &str, direction: ChannelDirection, err: AccessError) -> ChannelRecord {
    ChannelRecord::failed(name, direction, err.to_status())
}

fn not_found(name: &str, direction: ChannelDirection) -> ChannelRecord {
    rejected(name, direction, AccessError::NotFound(format!("channel {name}")))
}

fn not_readable(name: &str) -> ChannelRecord {
    rejected(
        name,
        ChannelDirection::Read,
        AccessError::Validation(format!("channel not readable: {name}")),
    )
}

impl ChannelExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: GatewayMetrics) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    /// Read a set of channels in one driver call.
    ///
    /// Unknown or unreadable channels get FAILURE records without reaching the driver.
    /// A connection error fails the whole call and no records are returned.
    pub fn read(&self, device: &Device, names: &BTreeSet<String>) -> Result<Vec<ChannelRecord>> {
        let mut local = Vec::new();
        let mut targets = BTreeSet::new();
        for name in names {
            match device.channel(name) {
                None => local.push(not_found(name, ChannelDirection::Read)),
                Some(ch) if !ch.is_readable() => local.push(not_readable(name)),
                Some(_) => {
                    targets.insert(name.clone());
                }
            }
        }

        let mut records = if targets.is_empty() {
            Vec::new()
        } else {
            let mut driver = device.lock_driver();
            match driver.read(&targets) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        device = device.id(),
                        driver = driver.kind(),
                        error = %e,
                        "batch read aborted"
                    );
                    if e.is_connection() {
                        self.count(|m| m.connection_errors.inc());
                    }
                    return Err(e.into());
                }
            }
        };
        records.extend(local);
        self.count_records(&records, |m| m.channel_reads.inc_by(records.len() as u64));
        Ok(records)
    }

    /// Write one record. Always returns a record; failures are reported in its status.
    pub fn write(&self, device: &Device, mut record: ChannelRecord) -> ChannelRecord {
        let name = record.channel_name.clone();
        let rejection = match (device.channel(&name), &record.value) {
            (_, None) => Some(AccessError::Validation("no value to write".to_string())),
            (None, _) => Some(AccessError::NotFound(format!("channel {name}"))),
            (Some(ch), _) if !ch.is_writable() => Some(AccessError::Validation(format!(
                "channel not writable: {name}"
            ))),
            (Some(ch), Some(v)) if v.data_type() != ch.value_type => {
                Some(AccessError::Validation(format!(
                    "value type {} does not match channel type {}",
                    v.data_type(),
                    ch.value_type
                )))
            }
            _ => None,
        };

        match rejection {
            Some(err) => record.set_failure(err.to_status()),
            None => {
                let mut driver = device.lock_driver();
                if let Err(e) = driver.write(slice::from_mut(&mut record)) {
                    tracing::warn!(
                        device = device.id(),
                        driver = driver.kind(),
                        channel = %name,
                        error = %e,
                        "write failed"
                    );
                    if e.is_connection() {
                        self.count(|m| m.connection_errors.inc());
                    }
                    let err = AccessError::from(e);
                    record.set_failure(ChannelStatus::failure_with_cause(err.to_string(), &err));
                }
            }
        }
        self.count_records(slice::from_ref(&record), |m| m.channel_writes.inc());
        record
    }

    /// Bind a reusable read over `names`, kept in the given order.
    ///
    /// Nothing is read here. Unknown or unreadable names hold FAILURE records for the life
    /// of the plan; the rest are handed to the driver's own prepared read.
    pub fn prepare_read(&self, device: Arc<Device>, names: &[String]) -> Result<PreparedReadPlan> {
        let mut records = Vec::with_capacity(names.len());
        let mut slots = Vec::new();
        let mut targets = Vec::new();
        for (i, name) in names.iter().enumerate() {
            match device.channel(name) {
                None => records.push(not_found(name, ChannelDirection::Read)),
                Some(ch) if !ch.is_readable() => records.push(not_readable(name)),
                Some(_) => {
                    records.push(ChannelRecord::read(name.as_str()));
                    slots.push(i);
                    targets.push(name.clone());
                }
            }
        }

        let inner = if targets.is_empty() {
            None
        } else {
            let inner = device.lock_driver().prepare_read(&targets)?;
            // Slots index the driver's records one to one.
            if inner.records().len() != targets.len() {
                return Err(AccessError::Internal(format!(
                    "driver prepared {} records for {} channels on device {}",
                    inner.records().len(),
                    targets.len(),
                    device.id()
                )));
            }
            Some(inner)
        };
        tracing::debug!(device = device.id(), channels = names.len(), "prepared read bound");
        Ok(PreparedReadPlan::new(
            device,
            inner,
            records,
            slots,
            self.metrics.clone(),
        ))
    }

    fn count(&self, f: impl FnOnce(&GatewayMetrics)) {
        if let Some(m) = &self.metrics {
            f(m);
        }
    }

    fn count_records(&self, records: &[ChannelRecord], f: impl FnOnce(&GatewayMetrics)) {
        if let Some(m) = &self.metrics {
            f(m);
            let failures = records.iter().filter(|r| !r.is_success()).count();
            m.channel_failures.inc_by(failures as u64);
        }
    }
}
