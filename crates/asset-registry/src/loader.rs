use crate::types::DeviceDescriptor;
use crate::{Device, DeviceRegistry};
use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};

/// Decode one YAML descriptor. The file name is attached to every error.
pub fn load_descriptor_file(path: impl AsRef<Path>) -> anyhow::Result<DeviceDescriptor> {
    let path = path.as_ref();
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let desc: DeviceDescriptor = serde_yaml::from_reader(file)
        .with_context(|| format!("device descriptor {}", path.display()))?;
    if desc.id.trim().is_empty() {
        bail!("device descriptor {} has an empty id", path.display());
    }
    Ok(desc)
}

/// Load every `.yml`/`.yaml` descriptor in a directory, in file name order.
pub fn load_descriptors_dir(dir: impl AsRef<Path>) -> anyhow::Result<Vec<DeviceDescriptor>> {
    let dir = dir.as_ref();
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("reading directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    entries.iter().map(load_descriptor_file).collect()
}

/// Attach drivers to descriptors and register the resulting devices.
pub fn register_descriptors(
    registry: &DeviceRegistry,
    descriptors: Vec<DeviceDescriptor>,
) -> anyhow::Result<usize> {
    let mut count = 0;
    for desc in descriptors {
        let id = desc.id.clone();
        let device =
            Device::from_descriptor(desc).with_context(|| format!("attaching device: {id}"))?;
        registry.register(device);
        count += 1;
    }
    Ok(count)
}
