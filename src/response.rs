//! Standard response envelopes of the REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity records are opaque JSON objects; only `_id` is interpreted.
pub type Record = Value;

pub const ID_FIELD: &str = "_id";

/// `GET {endpoint}` payload. Also the unit stored in the list cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPayload {
    pub data: Vec<Record>,
    pub count: u64,
}

#[derive(Deserialize)]
struct RawList {
    #[serde(default)]
    data: Vec<Record>,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Deserialize)]
struct RawOne {
    data: Record,
}

#[derive(Deserialize)]
struct RawError {
    message: Option<String>,
}

impl ListPayload {
    pub fn new(data: Vec<Record>) -> Self {
        let count = data.len() as u64;
        ListPayload { data, count }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.data.iter().position(|r| record_id(r) == Some(id))
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.data.iter().find(|r| record_id(r) == Some(id))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.data.iter().filter_map(record_id).collect()
    }
}

/// `_id` of a record when it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Decode `{ data: [...], count }`; `count` falls back to the number of rows.
pub fn decode_list(body: Value) -> Result<ListPayload, serde_json::Error> {
    let raw: RawList = serde_json::from_value(body)?;
    let count = raw.count.unwrap_or(raw.data.len() as u64);
    Ok(ListPayload {
        data: raw.data,
        count,
    })
}

/// Decode `{ data: {...} }`.
pub fn decode_one(body: Value) -> Result<Record, serde_json::Error> {
    let raw: RawOne = serde_json::from_value(body)?;
    Ok(raw.data)
}

/// `{ message }` of an error body, used verbatim as the surfaced error text.
pub fn error_message(body: &Value) -> Option<String> {
    RawError::deserialize(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
}
