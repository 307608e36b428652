use crate::{create_driver, Channel, DeviceDescriptor, RegistryError, Result};
use channel_driver::Driver;
use std::collections::HashSet;
use std::fmt;
use parking_lot::{Mutex, MutexGuard};

/// A registered asset: its channel configuration plus the driver that reaches it.
///
/// Immutable once built. The driver sits behind a per-device lock so requests against the
/// same device are serialized while different devices proceed in parallel.
pub struct Device {
    id: String,
    channels: Vec<Channel>,
    driver: Mutex<Box<dyn Driver>>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        channels: Vec<Channel>,
        driver: Box<dyn Driver>,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        let mut seen = HashSet::new();
        for ch in &channels {
            if !seen.insert(ch.name.as_str()) {
                return Err(RegistryError::DuplicateChannel {
                    device: id,
                    channel: ch.name.clone(),
                });
            }
        }
        Ok(Self {
            id,
            channels,
            driver: Mutex::new(driver),
        })
    }

    /// Build a device and attach the driver its descriptor names.
    pub fn from_descriptor(desc: DeviceDescriptor) -> Result<Self> {
        let driver = create_driver(&desc)?;
        Self::new(desc.id, desc.channels, driver)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Channels in configuration order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Exclusive access to the driver; blocks while another request uses this device.
    pub fn lock_driver(&self) -> MutexGuard<'_, Box<dyn Driver>> {
        self.driver.lock()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelAccess;
    use channel_driver::{DataType, LoopbackDriver};

    #[test]
    fn test_rejects_duplicate_channels() {
        let channels = vec![
            Channel::new("a", DataType::Integer, ChannelAccess::Read),
            Channel::new("a", DataType::Long, ChannelAccess::Write),
        ];
        let err = Device::new("dev", channels, Box::new(LoopbackDriver::new())).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateChannel { .. }));
    }

    #[test]
    fn test_rejects_empty_id() {
        let err = Device::new(" ", vec![], Box::new(LoopbackDriver::new())).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyId));
    }

    #[test]
    fn test_unsupported_driver_kind() {
        let desc = DeviceDescriptor {
            id: "plc".into(),
            driver: "modbus".into(),
            channels: vec![],
        };
        let err = Device::from_descriptor(desc).unwrap_err();
        assert!(err.to_string().contains("modbus"));
    }

    #[test]
    fn test_channel_lookup_keeps_order() {
        let channels = vec![
            Channel::new("z", DataType::Boolean, ChannelAccess::ReadWrite),
            Channel::new("a", DataType::String, ChannelAccess::Read),
        ];
        let dev = Device::new("dev", channels, Box::new(LoopbackDriver::new())).unwrap();
        let names: Vec<&str> = dev.channels().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert!(dev.channel("a").is_some_and(|c| !c.is_writable()));
        assert!(dev.channel("missing").is_none());
    }
}
