use crate::{Device, DeviceListener};
use prometheus::core::Collector;
use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Gateway-wide counters, cloned into every executor that reports into the hub.
#[derive(Clone)]
pub struct GatewayMetrics {
    pub devices_registered: IntGauge,
    pub channel_reads: IntCounter,
    pub channel_writes: IntCounter,
    pub channel_failures: IntCounter,
    pub connection_errors: IntCounter,
}

impl GatewayMetrics {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            devices_registered: IntGauge::new(
                "gw_devices_registered",
                "Number of devices currently registered",
            )?,
            channel_reads: IntCounter::new("gw_channel_reads_total", "Channel records read")?,
            channel_writes: IntCounter::new("gw_channel_writes_total", "Channel records written")?,
            channel_failures: IntCounter::new(
                "gw_channel_failures_total",
                "Channel records that ended in FAILURE",
            )?,
            connection_errors: IntCounter::new(
                "gw_connection_errors_total",
                "Driver calls aborted by a connection error",
            )?,
        })
    }

    fn collectors(&self) -> [Box<dyn Collector>; 5] {
        [
            Box::new(self.devices_registered.clone()),
            Box::new(self.channel_reads.clone()),
            Box::new(self.channel_writes.clone()),
            Box::new(self.channel_failures.clone()),
            Box::new(self.connection_errors.clone()),
        ]
    }
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub gw: GatewayMetrics,
}

impl MetricsHub {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let gw = GatewayMetrics::new()?;
        for collector in gw.collectors() {
            registry.register(collector)?;
        }
        Ok(Self { registry, gw })
    }

    /// Prometheus text exposition of every gateway metric.
    pub fn encode_text(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|e| format!("# metrics unavailable: {e}\n"))
    }
}

// Tracks the device gauge when subscribed to a `DeviceRegistry`.
impl DeviceListener for MetricsHub {
    fn on_device_added(&self, _device: Arc<Device>) {
        self.gw.devices_registered.inc();
    }

    fn on_device_removed(&self, _id: &str) {
        self.gw.devices_registered.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceRegistry;
    use channel_driver::LoopbackDriver;

    #[test]
    fn test_gauge_follows_registry() {
        let hub = Arc::new(MetricsHub::new().unwrap());
        let reg = DeviceRegistry::new();
        reg.subscribe(hub.clone());

        for id in ["a", "b", "a"] {
            reg.register(Device::new(id, vec![], Box::new(LoopbackDriver::new())).unwrap());
        }
        assert_eq!(hub.gw.devices_registered.get(), 2);
        reg.unregister("b");
        assert_eq!(hub.gw.devices_registered.get(), 1);

        let text = hub.encode_text();
        assert!(text.contains("gw_devices_registered 1"));
        assert!(text.contains("gw_channel_reads_total 0"));
    }
}
