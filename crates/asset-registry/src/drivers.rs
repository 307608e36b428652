use crate::{DeviceDescriptor, RegistryError, Result};
use channel_driver::{Driver, LoopbackDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Loopback,
}

impl DriverKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "loopback" => Some(Self::Loopback),
            _ => None,
        }
    }
}

/// Build the driver named by a descriptor. Loopback channels start at their type's zero value.
pub fn create_driver(desc: &DeviceDescriptor) -> Result<Box<dyn Driver>> {
    match DriverKind::from_name(&desc.driver) {
        Some(DriverKind::Loopback) => Ok(Box::new(LoopbackDriver::seeded(
            desc.channels
                .iter()
                .map(|c| (c.name.clone(), c.value_type.default_value())),
        ))),
        None => Err(RegistryError::UnsupportedDriver {
            device: desc.id.clone(),
            kind: desc.driver.clone(),
        }),
    }
}
