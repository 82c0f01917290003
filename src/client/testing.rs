//! In-memory REST backend for tests: records requests, serves CRUD over seeded records, and replays scripted failures.
//!
//! Requests are answered from the state at arrival; the configured delay only holds the answer back.

use crate::client::{ApiRequest, ApiResponse, ApiTransport, Method};
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Outcome forced on the next request instead of normal handling.
pub(crate) enum Scripted {
    Status(u16, Option<Value>),
    Error(ApiError),
    /// Never answers within any sane timeout.
    Hang,
}

#[derive(Default)]
struct MockState {
    records: HashMap<String, Vec<Value>>,
    requests: Vec<ApiRequest>,
    scripted: VecDeque<Scripted>,
    delay: Option<Duration>,
    method_delays: HashMap<&'static str, Duration>,
    next_id: u64,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed(&self, endpoint: &str, records: Vec<Value>) {
        self.lock().records.insert(endpoint.to_string(), records);
    }

    pub(crate) fn script(&self, outcome: Scripted) {
        self.lock().scripted.push_back(outcome);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Delay for one method only; takes precedence over `set_delay`.
    pub(crate) fn set_method_delay(&self, method: Method, delay: Duration) {
        self.lock().method_delays.insert(method.as_str(), delay);
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub(crate) fn requests_for(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.lock();
        let mut parts = request.path.splitn(2, '/');
        let endpoint = parts.next().unwrap_or_default().to_string();
        let id = parts.next().map(str::to_string);
        match (request.method, id) {
            (Method::Get, None) => {
                let rows: Vec<Value> = state
                    .records
                    .get(&endpoint)
                    .map(|rows| {
                        rows.iter()
                            .filter(|r| matches_query(r, &request.query))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                ok(200, json!({ "count": rows.len(), "data": rows }))
            }
            (Method::Get, Some(id)) => match find(&state, &endpoint, &id) {
                Some(r) => ok(200, json!({ "data": r })),
                None => not_found(),
            },
            (Method::Post, None) => {
                state.next_id += 1;
                let mut record = request.body.clone().unwrap_or_else(|| json!({}));
                if let Value::Object(m) = &mut record {
                    m.insert("_id".into(), Value::String(format!("{:024x}", state.next_id)));
                }
                state.records.entry(endpoint).or_default().push(record.clone());
                ok(201, json!({ "data": record }))
            }
            (Method::Patch, Some(id)) => {
                let rows = state.records.entry(endpoint).or_default();
                match rows.iter_mut().find(|r| r["_id"] == id.as_str()) {
                    Some(Value::Object(existing)) => {
                        if let Some(Value::Object(patch)) = &request.body {
                            for (k, v) in patch {
                                existing.insert(k.clone(), v.clone());
                            }
                        }
                        ok(200, json!({ "data": existing.clone() }))
                    }
                    _ => not_found(),
                }
            }
            (Method::Delete, Some(id)) => {
                let rows = state.records.entry(endpoint).or_default();
                let before = rows.len();
                rows.retain(|r| r["_id"] != id.as_str());
                if rows.len() < before {
                    ok(200, json!({ "success": true }))
                } else {
                    not_found()
                }
            }
            _ => ApiResponse {
                status: 405,
                body: Some(json!({ "message": "Method not allowed" })),
            },
        }
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let (scripted, delay) = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            let delay = state
                .method_delays
                .get(request.method.as_str())
                .copied()
                .or(state.delay);
            (state.scripted.pop_front(), delay)
        };
        let outcome = match scripted {
            Some(Scripted::Status(status, body)) => Ok(ApiResponse { status, body }),
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ApiError::network("hung request released"))
            }
            None => Ok(self.handle(request)),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

fn ok(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: Some(body),
    }
}

fn not_found() -> ApiResponse {
    ApiResponse {
        status: 404,
        body: Some(json!({ "message": "Not found" })),
    }
}

fn find(state: &MockState, endpoint: &str, id: &str) -> Option<Value> {
    state
        .records
        .get(endpoint)
        .and_then(|rows| rows.iter().find(|r| r["_id"] == id).cloned())
}

/// `search` matches any string field case-insensitively; other params match the field's string form.
fn matches_query(record: &Value, query: &[(String, String)]) -> bool {
    query.iter().all(|(k, v)| {
        if k == "search" {
            let needle = v.to_lowercase();
            record
                .as_object()
                .map(|m| {
                    m.values()
                        .filter_map(Value::as_str)
                        .any(|s| s.to_lowercase().contains(&needle))
                })
                .unwrap_or(false)
        } else {
            match record.get(k) {
                Some(Value::String(s)) => s == v,
                Some(Value::Bool(b)) => b.to_string() == *v,
                Some(Value::Number(n)) => n.to_string() == *v,
                _ => false,
            }
        }
    })
}
