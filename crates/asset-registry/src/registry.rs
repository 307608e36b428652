//! Concurrent catalog of available devices
//!
//! Readers load an immutable map through `ArcSwap` and never take a lock. Writers are
//! serialized among themselves, build the next map copy-on-write and publish it in one
//! atomic store, so a snapshot never shows a half-applied registration. Subscribers are
//! notified before the writer lock is released.

use crate::Device;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Receiver of device appearance and removal events.
///
/// A discovery source drives the registry through this trait; the registry forwards each
/// applied change to its own subscribers. Events reach subscribers in the order the
/// changes were applied, on the mutating thread. A subscriber must not mutate the registry
/// that is notifying it.
pub trait DeviceListener: Send + Sync {
    fn on_device_added(&self, device: Arc<Device>);
    fn on_device_removed(&self, id: &str);
}

type DeviceMap = BTreeMap<String, Arc<Device>>;

pub struct DeviceRegistry {
    devices: ArcSwap<DeviceMap>,
    writer: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn DeviceListener>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: ArcSwap::from_pointee(DeviceMap::new()),
            writer: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Add a device, replacing any device with the same id. Returns the replaced device.
    ///
    /// A replacement is reported to subscribers as a removal followed by an addition.
    pub fn register(&self, device: impl Into<Arc<Device>>) -> Option<Arc<Device>> {
        let device = device.into();
        let _guard = self.writer.lock();
        let mut next = DeviceMap::clone(&self.devices.load());
        let replaced = next.insert(device.id().to_string(), Arc::clone(&device));
        self.devices.store(Arc::new(next));

        if replaced.is_some() {
            tracing::info!(device = device.id(), "device reconfigured");
            self.notify_removed(device.id());
        } else {
            tracing::info!(
                device = device.id(),
                channels = device.channels().len(),
                "device registered"
            );
        }
        self.notify_added(&device);
        replaced
    }

    /// Remove a device by id. Unknown ids are ignored and return `None`.
    pub fn unregister(&self, id: &str) -> Option<Arc<Device>> {
        let _guard = self.writer.lock();
        let current = self.devices.load_full();
        if !current.contains_key(id) {
            return None;
        }
        let mut next = DeviceMap::clone(&current);
        let removed = next.remove(id);
        self.devices.store(Arc::new(next));

        tracing::info!(device = id, "device unregistered");
        self.notify_removed(id);
        removed
    }

    /// Point-in-time view of all devices, ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<Device>> {
        self.devices.load().values().cloned().collect()
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.load().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.devices.load().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.load().is_empty()
    }

    pub fn subscribe(&self, listener: Arc<dyn DeviceListener>) {
        self.listeners.write().push(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn DeviceListener>> {
        self.listeners.read().clone()
    }

    fn notify_added(&self, device: &Arc<Device>) {
        for l in self.listeners() {
            l.on_device_added(Arc::clone(device));
        }
    }

    fn notify_removed(&self, id: &str) {
        for l in self.listeners() {
            l.on_device_removed(id);
        }
    }
}

impl DeviceListener for DeviceRegistry {
    fn on_device_added(&self, device: Arc<Device>) {
        self.register(device);
    }

    fn on_device_removed(&self, id: &str) {
        self.unregister(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, ChannelAccess};
    use channel_driver::{DataType, LoopbackDriver};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::thread;
    use std::time::Duration;

    fn device(id: &str, channels: &[&str]) -> Device {
        let channels = channels
            .iter()
            .map(|n| Channel::new(*n, DataType::Integer, ChannelAccess::ReadWrite))
            .collect();
        Device::new(id, channels, Box::new(LoopbackDriver::new())).unwrap()
    }

    #[derive(Default)]
    struct Counter(AtomicI64);

    impl DeviceListener for Counter {
        fn on_device_added(&self, _device: Arc<Device>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn on_device_removed(&self, _id: &str) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct SlowListener;

    impl DeviceListener for SlowListener {
        fn on_device_added(&self, _device: Arc<Device>) {
            thread::sleep(Duration::from_millis(50));
        }
        fn on_device_removed(&self, _id: &str) {}
    }

    #[test]
    fn test_mirror_follows_source_with_slow_subscriber() {
        let source = Arc::new(DeviceRegistry::new());
        let mirror = Arc::new(DeviceRegistry::new());
        source.subscribe(Arc::new(SlowListener));
        source.subscribe(mirror.clone());

        let adder = {
            let source = Arc::clone(&source);
            thread::spawn(move || {
                source.register(device("a", &["x"]));
            })
        };
        // The add is published and still notifying when the removal arrives.
        thread::sleep(Duration::from_millis(10));
        source.unregister("a");
        adder.join().unwrap();

        assert_eq!(source.ids(), mirror.ids());
    }

    #[test]
    fn test_register_lookup_unregister() {
        let reg = DeviceRegistry::new();
        assert!(reg.is_empty());
        reg.register(device("b", &["x"]));
        reg.register(device("a", &["y"]));

        assert_eq!(reg.ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(reg.lookup("a").is_some());
        assert!(reg.lookup("c").is_none());

        assert!(reg.unregister("a").is_some());
        assert!(reg.unregister("a").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_snapshot_is_stable_across_mutation() {
        let reg = DeviceRegistry::new();
        reg.register(device("a", &["x"]));
        let snap = reg.snapshot();
        reg.unregister("a");
        reg.register(device("b", &["y"]));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id(), "a");
    }

    #[test]
    fn test_replace_notifies_remove_then_add() {
        let reg = DeviceRegistry::new();
        let counter = Arc::new(Counter::default());
        reg.subscribe(counter.clone());

        reg.register(device("a", &["x"]));
        let old = reg.register(device("a", &["x", "y"]));
        assert!(old.is_some());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(reg.lookup("a").unwrap().channels().len(), 2);

        reg.unregister("a");
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_registry_as_discovery_listener() {
        let reg = Arc::new(DeviceRegistry::new());
        let discovery: Arc<dyn DeviceListener> = reg.clone();
        discovery.on_device_added(Arc::new(device("pump", &["rpm"])));
        assert!(reg.lookup("pump").is_some());
        discovery.on_device_removed("pump");
        assert!(reg.is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_devices() {
        let reg = Arc::new(DeviceRegistry::new());
        let writer = {
            let reg = Arc::clone(&reg);
            thread::spawn(move || {
                for i in 0..200 {
                    let id = format!("d{}", i % 5);
                    reg.register(device(&id, &["a", "b", "c"]));
                    if i % 3 == 0 {
                        reg.unregister(&id);
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    for _ in 0..200 {
                        for dev in reg.snapshot() {
                            assert_eq!(dev.channels().len(), 3);
                        }
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
