use crate::{AccessError, Result};
use asset_registry::{Device, GatewayMetrics};
use channel_driver::{ChannelRecord, ChannelStatus, DriverError, PreparedRead};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanState {
    Open,
    Closed,
}

/// A reusable read over a fixed, ordered channel set of one device.
///
/// `execute` refreshes the same record instances on every call. A connection error marks
/// the driver-backed records FAILURE but leaves the plan open for later attempts. After
/// `close` (or drop) the plan is finished and `execute` returns [`AccessError::Internal`].
pub struct PreparedReadPlan {
    device: Arc<Device>,
    inner: Option<Box<dyn PreparedRead>>,
    records: Vec<ChannelRecord>,
    // Position in `records` of each record the driver's prepared read returns.
    slots: Vec<usize>,
    metrics: Option<GatewayMetrics>,
    state: PlanState,
}

impl PreparedReadPlan {
    pub(crate) fn new(
        device: Arc<Device>,
        inner: Option<Box<dyn PreparedRead>>,
        records: Vec<ChannelRecord>,
        slots: Vec<usize>,
        metrics: Option<GatewayMetrics>,
    ) -> Self {
        Self {
            device,
            inner,
            records,
            slots,
            metrics,
            state: PlanState::Open,
        }
    }

    pub fn device_id(&self) -> &str {
        self.device.id()
    }

    pub fn is_closed(&self) -> bool {
        self.state == PlanState::Closed
    }

    /// Records as of the last execution, in the order given at preparation.
    pub fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    pub fn execute(&mut self) -> Result<&[ChannelRecord]> {
        if self.state == PlanState::Closed {
            return Err(AccessError::Internal(format!(
                "prepared read on device {} is closed",
                self.device.id()
            )));
        }

        let Self {
            device,
            inner,
            records,
            slots,
            metrics,
            ..
        } = self;

        if let Some(inner) = inner.as_mut() {
            let _driver = device.lock_driver();
            match inner.execute() {
                Ok(fresh) => {
                    for (rec, &slot) in fresh.iter().zip(slots.iter()) {
                        records[slot].clone_from(rec);
                    }
                }
                Err(DriverError::Connection(msg)) => {
                    tracing::warn!(device = device.id(), error = %msg, "prepared read execution failed");
                    if let Some(m) = metrics.as_ref() {
                        m.connection_errors.inc();
                    }
                    let err = AccessError::Connection(msg);
                    for &slot in slots.iter() {
                        records[slot]
                            .set_failure(ChannelStatus::failure_with_cause(err.to_string(), &err));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(m) = metrics.as_ref() {
            m.channel_reads.inc_by(records.len() as u64);
            let failures = records.iter().filter(|r| !r.is_success()).count();
            m.channel_failures.inc_by(failures as u64);
        }
        Ok(records.as_slice())
    }

    /// Release the driver's resources. Closing a closed plan does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == PlanState::Closed {
            return Ok(());
        }
        self.state = PlanState::Closed;
        if let Some(mut inner) = self.inner.take() {
            inner.close()?;
        }
        tracing::debug!(device = self.device.id(), "prepared read closed");
        Ok(())
    }
}

impl Drop for PreparedReadPlan {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(device = self.device.id(), error = %e, "closing prepared read on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{AccessError, ChannelExecutor};
    use asset_registry::{Channel, ChannelAccess, Device};
    use channel_driver::{DataType, LoopbackDriver, LoopbackHandle, TypedValue};
    use std::sync::Arc;

    fn device() -> (Arc<Device>, LoopbackHandle) {
        let driver = LoopbackDriver::seeded([
            ("a".to_string(), TypedValue::Double(1.0)),
            ("b".to_string(), TypedValue::Double(2.0)),
        ]);
        let handle = driver.handle();
        let channels = vec![
            Channel::new("a", DataType::Double, ChannelAccess::Read),
            Channel::new("b", DataType::Double, ChannelAccess::Read),
        ];
        (
            Arc::new(Device::new("dev", channels, Box::new(driver)).unwrap()),
            handle,
        )
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_io_until_execute_and_order_is_kept() {
        let (dev, handle) = device();
        let mut plan = ChannelExecutor::new()
            .prepare_read(dev, &names(&["b", "missing", "a"]))
            .unwrap();
        assert_eq!(handle.prepare_calls(), 1);
        assert_eq!(handle.execute_calls(), 0);

        let recs = plan.execute().unwrap();
        let order: Vec<&str> = recs.iter().map(|r| r.channel_name.as_str()).collect();
        assert_eq!(order, vec!["b", "missing", "a"]);
        assert_eq!(recs[0].value, Some(TypedValue::Double(2.0)));
        assert!(!recs[1].is_success());
        assert_eq!(recs[2].value, Some(TypedValue::Double(1.0)));
    }

    #[test]
    fn test_execute_after_close_is_internal_error() {
        let (dev, handle) = device();
        let mut plan = ChannelExecutor::new().prepare_read(dev, &names(&["a"])).unwrap();
        plan.execute().unwrap();
        plan.close().unwrap();
        plan.close().unwrap();
        assert!(plan.is_closed());
        assert_eq!(handle.open_plans(), 0);
        assert!(matches!(plan.execute(), Err(AccessError::Internal(_))));
    }

    #[test]
    fn test_connection_error_keeps_plan_open() {
        let (dev, handle) = device();
        let mut plan = ChannelExecutor::new().prepare_read(dev, &names(&["a", "b"])).unwrap();

        handle.disconnect();
        let recs = plan.execute().unwrap();
        assert!(recs.iter().all(|r| !r.is_success()));
        assert!(!plan.is_closed());

        handle.reconnect();
        let recs = plan.execute().unwrap();
        assert!(recs.iter().all(|r| r.is_success()));
    }

    #[test]
    fn test_drop_releases_driver_plan() {
        let (dev, handle) = device();
        {
            let _plan = ChannelExecutor::new().prepare_read(dev, &names(&["a"])).unwrap();
            assert_eq!(handle.open_plans(), 1);
        }
        assert_eq!(handle.open_plans(), 0);
    }

    #[test]
    fn test_plan_without_known_channels_never_calls_driver() {
        let (dev, handle) = device();
        let mut plan = ChannelExecutor::new().prepare_read(dev, &names(&["x"])).unwrap();
        assert_eq!(plan.execute().unwrap().len(), 1);
        assert_eq!(handle.prepare_calls(), 0);
    }
}
