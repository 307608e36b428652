//! Conversion of request text into typed channel values
//!
//! Pure functions with no device access. Failures are always validation failures and
//! never reach a driver.

use crate::AccessError;
use channel_driver::{ChannelDirection, ChannelRecord, ChannelStatus, DataType, TypedValue};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("unrecognized data type {0:?}")]
    UnknownType(String),
    #[error("cannot parse {value:?} as {data_type}")]
    InvalidValue { value: String, data_type: DataType },
    #[error("missing {0} in write request")]
    Missing(&'static str),
}

/// Match a type tag case-insensitively against the supported data types.
pub fn parse_data_type(tag: &str) -> Result<DataType, ConversionError> {
    match tag.trim().to_ascii_uppercase().as_str() {
        "INTEGER" => Ok(DataType::Integer),
        "LONG" => Ok(DataType::Long),
        "FLOAT" => Ok(DataType::Float),
        "DOUBLE" => Ok(DataType::Double),
        "BOOLEAN" => Ok(DataType::Boolean),
        "STRING" => Ok(DataType::String),
        _ => Err(ConversionError::UnknownType(tag.to_string())),
    }
}

/// Parse `raw` as a value of the type named by `tag`.
///
/// `INTEGER` is limited to the 32-bit range while `LONG` takes the full 64-bit range;
/// booleans accept only `true`/`false` in any case.
pub fn convert(tag: &str, raw: &str) -> Result<TypedValue, ConversionError> {
    let data_type = parse_data_type(tag)?;
    let invalid = || ConversionError::InvalidValue {
        value: raw.to_string(),
        data_type,
    };
    let value = match data_type {
        DataType::Integer => TypedValue::Integer(raw.parse::<i32>().map_err(|_| invalid())? as i64),
        DataType::Long => TypedValue::Long(raw.parse::<i64>().map_err(|_| invalid())?),
        DataType::Float => TypedValue::Float(raw.parse::<f32>().map_err(|_| invalid())?),
        DataType::Double => TypedValue::Double(raw.parse::<f64>().map_err(|_| invalid())?),
        DataType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => TypedValue::Boolean(true),
            "false" => TypedValue::Boolean(false),
            _ => return Err(invalid()),
        },
        DataType::String => TypedValue::String(raw.to_string()),
    };
    Ok(value)
}

/// Build the write record for one channel from request text.
///
/// On conversion failure the returned record is already FAILURE and carries no value, so
/// the caller can hand it back without touching the device.
pub fn create_write_record(
    channel_name: &str,
    value: Option<&str>,
    tag: Option<&str>,
) -> ChannelRecord {
    let converted = match (value, tag) {
        (None, _) => Err(ConversionError::Missing("value")),
        (_, None) => Err(ConversionError::Missing("type")),
        (Some(value), Some(tag)) => convert(tag, value),
    };
    match converted {
        Ok(v) => ChannelRecord::write(channel_name, v),
        Err(e) => {
            let err = AccessError::from(e.clone());
            ChannelRecord::failed(
                channel_name,
                ChannelDirection::Write,
                ChannelStatus::failure_with_cause(err.to_string(), &e),
            )
        }
    }
}
