use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire format for every timestamp the API emits or accepts.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Postgres `to_char` pattern producing the same text as [`TIMESTAMP_FORMAT`].
pub const SQL_TIMESTAMP_FORMAT: &str = "YYYY-MM-DD HH24:MI:SS";

pub const SUCCESS_MESSAGE: &str = "success";

/// Response envelope shared by successful and failed responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub path: String,
    pub timestamp: String,
    pub status: u16,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(path: impl Into<String>, status: u16, message: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            timestamp: now_timestamp(),
            status,
            message: message.into(),
            data,
        }
    }

    pub fn success(path: impl Into<String>, status: u16, data: Value) -> Self {
        Self::new(path, status, SUCCESS_MESSAGE, data)
    }
}

pub fn now_timestamp() -> String {
    format_timestamp(&Local::now().naive_local())
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}

/// Replace the timestamp of a serialized envelope, keeping every other field intact.
pub fn refresh_timestamp(body: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let mut envelope: Envelope = serde_json::from_slice(body)?;
    envelope.timestamp = now_timestamp();
    serde_json::to_vec(&envelope)
}
