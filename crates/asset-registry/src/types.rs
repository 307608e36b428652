use channel_driver::DataType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    /// Driver kind, e.g. "loopback".
    pub driver: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub value_type: DataType,
    #[serde(rename = "type", default)]
    pub access: ChannelAccess,
}

impl Channel {
    pub fn new(name: impl Into<String>, value_type: DataType, access: ChannelAccess) -> Self {
        Self {
            name: name.into(),
            value_type,
            access,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self.access, ChannelAccess::Read | ChannelAccess::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.access, ChannelAccess::Write | ChannelAccess::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelAccess {
    Read,
    Write,
    #[default]
    ReadWrite,
}
