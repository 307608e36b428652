use crate::{create_write_record, AccessError, ChannelExecutor, ResponsePayload};
use asset_registry::{DeviceRegistry, MetricsHub};
use channel_driver::{ChannelDirection, ChannelRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Resource roots accepted in front of the device path.
const RESOURCE_ROOTS: [&str; 2] = ["devices", "assets"];

/// Separator between channel names in a batch read.
const CHANNEL_DELIMITER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestKind {
    #[serde(alias = "GET")]
    Read,
    #[serde(alias = "PUT")]
    Write,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Read => f.write_str("GET"),
            RequestKind::Write => f.write_str("PUT"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePayload {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,
}

impl WritePayload {
    pub fn new(value: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            value_type: Some(value_type.into()),
        }
    }
}

/// Path segments below the resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    segments: Vec<String>,
}

impl Address {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Strip the resource root (`devices` or `assets`, any case) from tokenized resources.
    ///
    /// Returns `None` when the first resource is not a known root.
    pub fn parse<S: AsRef<str>>(resources: &[S]) -> Option<Self> {
        let (root, rest) = resources.split_first()?;
        let root = root.as_ref();
        if !RESOURCE_ROOTS.iter().any(|r| r.eq_ignore_ascii_case(root)) {
            return None;
        }
        Some(Self {
            segments: rest.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Dispatches requests to the registry and the channel executor.
///
/// | segments              | kind  | result                                |
/// |-----------------------|-------|---------------------------------------|
/// | `[]`                  | READ  | device ids keyed by 1-based ordinal   |
/// | `[device]`            | READ  | channel names mapped to `true`        |
/// | `[device, a_b_c]`     | READ  | batch read of the named channel set   |
/// | `[device, channel]`   | WRITE | single write from the payload         |
///
/// Any other shape yields an empty payload.
#[derive(Clone)]
pub struct RequestRouter {
    registry: Arc<DeviceRegistry>,
    executor: ChannelExecutor,
}

impl RequestRouter {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self {
            registry,
            executor: ChannelExecutor::new(),
        }
    }

    pub fn with_metrics(registry: Arc<DeviceRegistry>, hub: &MetricsHub) -> Self {
        Self {
            registry,
            executor: ChannelExecutor::with_metrics(hub.gw.clone()),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &ChannelExecutor {
        &self.executor
    }

    /// Handle one request on a blocking worker so device I/O never stalls request intake.
    pub async fn handle(
        &self,
        kind: RequestKind,
        address: Address,
        payload: Option<WritePayload>,
    ) -> ResponsePayload {
        let router = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            router.dispatch(kind, address.segments(), payload.as_ref())
        });
        match task.await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "request worker failed");
                let mut resp = ResponsePayload::new();
                resp.set_error(AccessError::Internal(e.to_string()).to_string());
                resp
            }
        }
    }

    /// Synchronous dispatch; may block on device I/O.
    pub fn dispatch(
        &self,
        kind: RequestKind,
        segments: &[String],
        payload: Option<&WritePayload>,
    ) -> ResponsePayload {
        tracing::info!("{kind} request received: /{}", segments.join("/"));
        let mut resp = ResponsePayload::new();
        match (kind, segments) {
            (RequestKind::Read, []) => self.list_devices(&mut resp),
            (RequestKind::Read, [device_id]) => self.list_channels(&mut resp, device_id),
            (RequestKind::Read, [device_id, spec]) => self.read_channels(&mut resp, device_id, spec),
            (RequestKind::Write, [device_id, channel]) => {
                self.write_channel(&mut resp, device_id, channel, payload)
            }
            _ => {
                tracing::debug!(%kind, segments = segments.len(), "unrecognized request shape ignored");
            }
        }
        tracing::info!("{kind} request completed with {} entries", resp.len());
        resp
    }

    fn list_devices(&self, resp: &mut ResponsePayload) {
        for (i, id) in self.registry.ids().into_iter().enumerate() {
            resp.add_metric((i + 1).to_string(), id);
        }
    }

    fn list_channels(&self, resp: &mut ResponsePayload, device_id: &str) {
        let Some(device) = self.registry.lookup(device_id) else {
            tracing::debug!(device = device_id, "channel listing for unknown device");
            return;
        };
        for ch in device.channels() {
            resp.add_metric(ch.name.as_str(), true);
        }
    }

    fn read_channels(&self, resp: &mut ResponsePayload, device_id: &str, spec: &str) {
        let names: BTreeSet<String> = spec
            .split(CHANNEL_DELIMITER)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return;
        }

        let Some(device) = self.registry.lookup(device_id) else {
            let records: Vec<ChannelRecord> = names
                .iter()
                .map(|n| device_missing(n, ChannelDirection::Read, device_id))
                .collect();
            resp.add_records(&records);
            return;
        };

        match self.executor.read(&device, &names) {
            Ok(records) => resp.add_records(&records),
            Err(e) => {
                tracing::warn!(device = device_id, error = %e, "channel read failed");
                resp.set_error(e.to_string());
            }
        }
    }

    fn write_channel(
        &self,
        resp: &mut ResponsePayload,
        device_id: &str,
        channel: &str,
        payload: Option<&WritePayload>,
    ) {
        let record = create_write_record(
            channel,
            payload.and_then(|p| p.value.as_deref()),
            payload.and_then(|p| p.value_type.as_deref()),
        );
        let record = if !record.is_success() {
            record
        } else {
            match self.registry.lookup(device_id) {
                Some(device) => self.executor.write(&device, record),
                None => device_missing(channel, ChannelDirection::Write, device_id),
            }
        };
        resp.add_records(std::slice::from_ref(&record));
    }
}

fn device_missing(channel: &str, direction: ChannelDirection, device_id: &str) -> ChannelRecord {
    let err = AccessError::NotFound(format!("device {device_id}"));
    ChannelRecord::failed(channel, direction, err.to_status())
}
