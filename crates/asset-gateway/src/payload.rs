use channel_driver::{ChannelFlag, ChannelRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Key of the request-level error entry, set when a whole batch was aborted.
pub const ERROR_MESSAGE: &str = "errorMessage";

/// Marker written as the value of a record that has none.
pub const NO_VALUE: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl From<String> for Metric {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Metric {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i64> for Metric {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for Metric {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Flat name → metric map handed to the transport for serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResponsePayload {
    metrics: BTreeMap<String, Metric>,
}

impl ResponsePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_metric(&mut self, name: impl Into<String>, value: impl Into<Metric>) {
        self.metrics.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.metrics.get(name) {
            Some(Metric::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Metric)> {
        self.metrics.iter()
    }

    /// The request-level error, if the request was aborted as a whole.
    pub fn error_message(&self) -> Option<&str> {
        self.text(ERROR_MESSAGE)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.add_metric(ERROR_MESSAGE, message.into());
    }

    /// Add `<channel>_flag`, `_timestamp`, `_value` and, for failures, `_errorMessage`.
    pub fn add_records(&mut self, records: &[ChannelRecord]) {
        for rec in records {
            let prefix = &rec.channel_name;
            let value = rec
                .value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| NO_VALUE.to_string());
            let flag = rec.status.flag();
            self.add_metric(format!("{prefix}_flag"), flag.to_string());
            self.add_metric(format!("{prefix}_timestamp"), rec.timestamp);
            self.add_metric(format!("{prefix}_value"), value);
            if flag == ChannelFlag::Failure {
                let message = rec.status.message().unwrap_or_default();
                self.add_metric(format!("{prefix}_{ERROR_MESSAGE}"), message);
            }
        }
    }
}
