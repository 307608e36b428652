use crate::{
    ChannelRecord, ChannelStatus, Driver, DriverError, PreparedRead, Result, TypedValue,
};
use std::collections::{BTreeSet, HashMap};
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory driver: reads return whatever was last written.
///
/// A [`LoopbackHandle`] taken from the driver can drop and restore the simulated link and
/// inspect how the driver was called, which makes it useful as a test double.
pub struct LoopbackDriver {
    state: Arc<Mutex<LoopbackState>>,
}

#[derive(Default)]
struct LoopbackState {
    values: HashMap<String, TypedValue>,
    disconnected: bool,
    read_calls: Vec<BTreeSet<String>>,
    write_calls: usize,
    prepare_calls: usize,
    execute_calls: usize,
    open_plans: usize,
}

impl LoopbackState {
    fn check_link(&self) -> Result<()> {
        if self.disconnected {
            return Err(DriverError::Connection("loopback link is down".to_string()));
        }
        Ok(())
    }

    fn refresh(&self, rec: &mut ChannelRecord) {
        match self.values.get(&rec.channel_name) {
            Some(v) => rec.set_success(Some(v.clone())),
            None => {
                rec.value = None;
                rec.set_failure(ChannelStatus::failure(format!(
                    "no value stored for channel {}",
                    rec.channel_name
                )));
            }
        }
    }
}

impl Default for LoopbackDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState::default())),
        }
    }

    /// Start with the given channel values already stored.
    pub fn seeded<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (String, TypedValue)>,
    {
        let driver = Self::new();
        driver.state.lock().values.extend(values);
        driver
    }

    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Driver for LoopbackDriver {
    fn kind(&self) -> &'static str {
        "loopback"
    }

    fn read(&mut self, names: &BTreeSet<String>) -> Result<Vec<ChannelRecord>> {
        let mut state = self.state.lock();
        state.check_link()?;
        state.read_calls.push(names.clone());
        let records = names
            .iter()
            .map(|name| {
                let mut rec = ChannelRecord::read(name.as_str());
                state.refresh(&mut rec);
                rec
            })
            .collect();
        Ok(records)
    }

    fn write(&mut self, records: &mut [ChannelRecord]) -> Result<()> {
        let mut state = self.state.lock();
        state.check_link()?;
        state.write_calls += 1;
        for rec in records.iter_mut() {
            match &rec.value {
                Some(v) => {
                    state.values.insert(rec.channel_name.clone(), v.clone());
                    rec.set_success(None);
                }
                None => rec.set_failure(ChannelStatus::failure("no value to write")),
            }
        }
        tracing::trace!(count = records.len(), "loopback write");
        Ok(())
    }

    fn prepare_read(&mut self, names: &[String]) -> Result<Box<dyn PreparedRead>> {
        let mut state = self.state.lock();
        state.prepare_calls += 1;
        state.open_plans += 1;
        Ok(Box::new(LoopbackPreparedRead {
            state: Arc::clone(&self.state),
            records: names.iter().map(|n| ChannelRecord::read(n.as_str())).collect(),
            closed: false,
        }))
    }
}

/// Prepared read over the loopback store. Record instances are reused between executions.
pub struct LoopbackPreparedRead {
    state: Arc<Mutex<LoopbackState>>,
    records: Vec<ChannelRecord>,
    closed: bool,
}

impl PreparedRead for LoopbackPreparedRead {
    fn execute(&mut self) -> Result<&[ChannelRecord]> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        let mut state = self.state.lock();
        state.check_link()?;
        state.execute_calls += 1;
        for rec in self.records.iter_mut() {
            state.refresh(rec);
        }
        Ok(&self.records)
    }

    fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().open_plans -= 1;
        }
        Ok(())
    }
}

impl Drop for LoopbackPreparedRead {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Shared view into a [`LoopbackDriver`] for fault injection and call inspection.
#[derive(Clone)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackHandle {
    /// Make every following call fail with a connection error.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.state.lock().disconnected = false;
    }

    pub fn value(&self, name: &str) -> Option<TypedValue> {
        self.state.lock().values.get(name).cloned()
    }

    /// Channel sets passed to each successful `read`, oldest first.
    pub fn read_calls(&self) -> Vec<BTreeSet<String>> {
        self.state.lock().read_calls.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    pub fn prepare_calls(&self) -> usize {
        self.state.lock().prepare_calls
    }

    pub fn execute_calls(&self) -> usize {
        self.state.lock().execute_calls
    }

    pub fn open_plans(&self) -> usize {
        self.state.lock().open_plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_write_then_read() {
        let mut driver = LoopbackDriver::new();
        let mut recs = vec![ChannelRecord::write("x", TypedValue::Integer(42))];
        driver.write(&mut recs).unwrap();
        assert!(recs[0].is_success());

        let out = driver.read(&names(&["x"])).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, Some(TypedValue::Integer(42)));
    }

    #[test]
    fn test_unknown_channel_is_record_failure() {
        let mut driver = LoopbackDriver::new();
        let out = driver.read(&names(&["missing"])).unwrap();
        assert!(!out[0].is_success());
        assert!(out[0].value.is_none());
    }

    #[test]
    fn test_disconnect_fails_whole_call() {
        let mut driver = LoopbackDriver::seeded([("a".to_string(), TypedValue::Boolean(true))]);
        let handle = driver.handle();
        handle.disconnect();
        let err = driver.read(&names(&["a"])).unwrap_err();
        assert!(err.is_connection());
        assert!(handle.read_calls().is_empty());

        handle.reconnect();
        assert!(driver.read(&names(&["a"])).is_ok());
        assert_eq!(handle.read_calls().len(), 1);
    }

    #[test]
    fn test_prepared_read_reuses_records_and_closes() {
        let mut driver = LoopbackDriver::seeded([("a".to_string(), TypedValue::Long(1))]);
        let handle = driver.handle();
        let mut plan = driver
            .prepare_read(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(handle.open_plans(), 1);

        let recs = plan.execute().unwrap();
        assert_eq!(recs[0].value, Some(TypedValue::Long(1)));
        assert!(!recs[1].is_success());

        plan.close().unwrap();
        plan.close().unwrap();
        assert_eq!(handle.open_plans(), 0);
        assert!(matches!(plan.execute(), Err(DriverError::Closed)));
    }

    #[test]
    fn test_dropping_prepared_read_releases_it() {
        let mut driver = LoopbackDriver::new();
        let handle = driver.handle();
        {
            let _plan = driver.prepare_read(&["a".to_string()]).unwrap();
            assert_eq!(handle.open_plans(), 1);
        }
        assert_eq!(handle.open_plans(), 0);
    }
}
