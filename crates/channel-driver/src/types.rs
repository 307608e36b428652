use core::fmt;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch, taken from the wall clock.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Declared data type of a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    String,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::Integer,
        DataType::Long,
        DataType::Float,
        DataType::Double,
        DataType::Boolean,
        DataType::String,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Long => "LONG",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Boolean => "BOOLEAN",
            DataType::String => "STRING",
        }
    }

    /// Zero value of this type, used to seed fresh channels.
    pub fn default_value(&self) -> TypedValue {
        match self {
            DataType::Integer => TypedValue::Integer(0),
            DataType::Long => TypedValue::Long(0),
            DataType::Float => TypedValue::Float(0.0),
            DataType::Double => TypedValue::Double(0.0),
            DataType::Boolean => TypedValue::Boolean(false),
            DataType::String => TypedValue::String(String::new()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value tagged with its runtime type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Integer(i64),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

impl TypedValue {
    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::Integer(_) => DataType::Integer,
            TypedValue::Long(_) => DataType::Long,
            TypedValue::Float(_) => DataType::Float,
            TypedValue::Double(_) => DataType::Double,
            TypedValue::Boolean(_) => DataType::Boolean,
            TypedValue::String(_) => DataType::String,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(v) | TypedValue::Long(v) => write!(f, "{v}"),
            TypedValue::Float(v) => write!(f, "{v}"),
            TypedValue::Double(v) => write!(f, "{v}"),
            TypedValue::Boolean(v) => write!(f, "{v}"),
            TypedValue::String(v) => f.write_str(v),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelFlag {
    Success,
    Failure,
}

impl fmt::Display for ChannelFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelFlag::Success => f.write_str("SUCCESS"),
            ChannelFlag::Failure => f.write_str("FAILURE"),
        }
    }
}

/// Outcome of one channel operation.
///
/// A `Failure` status always carries a non-empty message, also when deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr")]
pub struct ChannelStatus {
    flag: ChannelFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
}

#[derive(Deserialize)]
struct StatusRepr {
    flag: ChannelFlag,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

impl TryFrom<StatusRepr> for ChannelStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, Self::Error> {
        let has_message = repr.message.as_deref().is_some_and(|m| !m.trim().is_empty());
        if repr.flag == ChannelFlag::Failure && !has_message {
            return Err("FAILURE status requires a non-empty message".to_string());
        }
        Ok(Self {
            flag: repr.flag,
            message: repr.message,
            cause: repr.cause,
        })
    }
}

impl ChannelStatus {
    pub fn success() -> Self {
        Self {
            flag: ChannelFlag::Success,
            message: None,
            cause: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown failure".to_string();
        }
        Self {
            flag: ChannelFlag::Failure,
            message: Some(message),
            cause: None,
        }
    }

    /// Failure that keeps the text of the underlying error.
    pub fn failure_with_cause(message: impl Into<String>, cause: &dyn std::error::Error) -> Self {
        let mut status = Self::failure(message);
        status.cause = Some(cause.to_string());
        status
    }

    pub fn flag(&self) -> ChannelFlag {
        self.flag
    }

    pub fn is_success(&self) -> bool {
        self.flag == ChannelFlag::Success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDirection {
    Read,
    Write,
}

/// One read or write result for a single channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_name: String,
    pub direction: ChannelDirection,
    pub value: Option<TypedValue>,
    pub status: ChannelStatus,
    /// Epoch milliseconds at completion.
    pub timestamp: i64,
}

impl ChannelRecord {
    /// A read record with no value yet.
    pub fn read(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            direction: ChannelDirection::Read,
            value: None,
            status: ChannelStatus::success(),
            timestamp: now_millis(),
        }
    }

    pub fn write(channel_name: impl Into<String>, value: TypedValue) -> Self {
        Self {
            channel_name: channel_name.into(),
            direction: ChannelDirection::Write,
            value: Some(value),
            status: ChannelStatus::success(),
            timestamp: now_millis(),
        }
    }

    /// A record that failed before any value was known.
    pub fn failed(
        channel_name: impl Into<String>,
        direction: ChannelDirection,
        status: ChannelStatus,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            direction,
            value: None,
            status,
            timestamp: now_millis(),
        }
    }

    pub fn set_success(&mut self, value: Option<TypedValue>) {
        if value.is_some() {
            self.value = value;
        }
        self.status = ChannelStatus::success();
        self.timestamp = now_millis();
    }

    pub fn set_failure(&mut self, status: ChannelStatus) {
        self.status = status;
        self.timestamp = now_millis();
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
