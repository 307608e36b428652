//! asset-registry: YAML-described devices and the live registry of available assets

mod types;
pub use types::{Channel, ChannelAccess, DeviceDescriptor};

mod error;
pub use error::{RegistryError, Result};

mod device;
pub use device::Device;

mod drivers;
pub use drivers::{create_driver, DriverKind};

mod registry;
pub use registry::{DeviceListener, DeviceRegistry};

mod loader;
pub use loader::{load_descriptor_file, load_descriptors_dir, register_descriptors};

mod metrics;
pub use metrics::{GatewayMetrics, MetricsHub};
