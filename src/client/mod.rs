//! Generic data access over `{base}/{endpoint}`: list/get/create/update/delete with
//! bearer auth, bounded attempts, retries, cancellation, and an optimistic list cache.

mod abort;
mod cache;
mod query;
mod settings;
mod transport;
#[cfg(test)]
pub(crate) mod testing;

pub use abort::{AbortController, AbortSignal};
pub use cache::{apply_command, CacheCommand, CacheKey, CacheSnapshot, ListCache};
pub use query::{FilterSet, ALL};
pub use settings::{ClientSettings, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
pub use transport::{ApiRequest, ApiResponse, ApiTransport, Method, ReqwestTransport};

use crate::error::ApiError;
use crate::response::{decode_list, decode_one, error_message, ListPayload, Record, ID_FIELD};
use crate::state::SessionContext;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// Prefix of ids given to optimistically created records until the server answers.
pub const TEMP_ID_PREFIX: &str = "temp-";

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4())
}

struct ClientInner {
    transport: Arc<dyn ApiTransport>,
    session: SessionContext,
    settings: ClientSettings,
    cache: Mutex<ListCache>,
}

/// Shared handle; clones use the same cache. Only this type writes the cache.
#[derive(Clone)]
pub struct DataClient {
    inner: Arc<ClientInner>,
}

impl DataClient {
    /// Client over HTTP using `settings.base_url`.
    pub fn new(settings: ClientSettings, session: SessionContext) -> Self {
        let transport = Arc::new(ReqwestTransport::new(settings.base_url.clone(), settings.timeout));
        Self::with_transport(transport, settings, session)
    }

    pub fn with_transport(
        transport: Arc<dyn ApiTransport>,
        settings: ClientSettings,
        session: SessionContext,
    ) -> Self {
        let cache = Mutex::new(ListCache::new(settings.cache_capacity));
        DataClient {
            inner: Arc::new(ClientInner {
                transport,
                session,
                settings,
                cache,
            }),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    /// List records, served from cache when this (endpoint, filters) pair is cached.
    pub async fn list(
        &self,
        endpoint: &str,
        filters: &FilterSet,
        abort: &AbortSignal,
    ) -> Result<ListPayload, ApiError> {
        if let Some(hit) = self.cached(endpoint, filters) {
            tracing::debug!(endpoint, filters = %filters.cache_key(), "list cache hit");
            return Ok(hit);
        }
        self.refetch(endpoint, filters, abort).await
    }

    /// List records from the network and overwrite the cache entry.
    /// A request aborted before it settles leaves the cache untouched, and so does one
    /// overtaken by a mutation of the same endpoint while it was in flight.
    pub async fn refetch(
        &self,
        endpoint: &str,
        filters: &FilterSet,
        abort: &AbortSignal,
    ) -> Result<ListPayload, ApiError> {
        let generation = self.lock_cache().generation(endpoint);
        let body = self
            .send(Method::Get, endpoint.to_string(), filters.to_query_pairs(), None, abort)
            .await?;
        if abort.is_aborted() {
            return Err(ApiError::cancelled());
        }
        let body = body.ok_or_else(|| ApiError::decode("empty list response"))?;
        let payload = decode_list(body).map_err(|e| ApiError::decode(format!("list response: {}", e)))?;
        let stored = self.lock_cache().insert_if_current(
            CacheKey::new(endpoint, filters.clone()),
            payload.clone(),
            generation,
        );
        if !stored {
            tracing::debug!(endpoint, filters = %filters.cache_key(), "list result outdated by a mutation, not cached");
        }
        Ok(payload)
    }

    pub fn cached(&self, endpoint: &str, filters: &FilterSet) -> Option<ListPayload> {
        self.lock_cache()
            .get(&CacheKey::new(endpoint, filters.clone()))
    }

    pub async fn get_by_id(&self, endpoint: &str, id: &str, abort: &AbortSignal) -> Result<Record, ApiError> {
        let body = self
            .send(Method::Get, entity_path(endpoint, id), Vec::new(), None, abort)
            .await?;
        decode_record(body)
    }

    /// Create a record. The record shows up in cached lists at once under a temporary id.
    pub async fn create(&self, endpoint: &str, payload: Map<String, Value>) -> Result<Record, ApiError> {
        self.require_token()?;
        let mut optimistic = payload.clone();
        optimistic.insert(ID_FIELD.to_string(), Value::String(temp_id()));
        let snapshot = self.lock_cache().apply(
            endpoint,
            &CacheCommand::Create {
                record: Value::Object(optimistic),
            },
        );
        let result = self
            .send(
                Method::Post,
                endpoint.to_string(),
                Vec::new(),
                Some(Value::Object(payload)),
                &AbortSignal::never(),
            )
            .await
            .and_then(decode_record);
        self.settle(endpoint, snapshot, result)
    }

    /// Patch a record. Cached copies are patched at once.
    pub async fn update(
        &self,
        endpoint: &str,
        id: &str,
        payload: Map<String, Value>,
    ) -> Result<Record, ApiError> {
        self.require_token()?;
        let snapshot = self.lock_cache().apply(
            endpoint,
            &CacheCommand::Update {
                id: id.to_string(),
                patch: payload.clone(),
            },
        );
        let result = self
            .send(
                Method::Patch,
                entity_path(endpoint, id),
                Vec::new(),
                Some(Value::Object(payload)),
                &AbortSignal::never(),
            )
            .await
            .and_then(decode_record);
        self.settle(endpoint, snapshot, result)
    }

    /// Delete a record. It disappears from cached lists at once; accepts `{ success: true }` or an empty body.
    pub async fn delete(&self, endpoint: &str, id: &str) -> Result<(), ApiError> {
        self.require_token()?;
        let snapshot = self.lock_cache().apply(endpoint, &CacheCommand::Delete { id: id.to_string() });
        let result = self
            .send(Method::Delete, entity_path(endpoint, id), Vec::new(), None, &AbortSignal::never())
            .await
            .map(|_| ());
        self.settle(endpoint, snapshot, result)
    }

    /// Drop every cached list of `endpoint`.
    pub fn invalidate(&self, endpoint: &str) {
        self.lock_cache().invalidate_endpoint(endpoint);
    }

    fn settle<T>(&self, endpoint: &str, snapshot: CacheSnapshot, result: Result<T, ApiError>) -> Result<T, ApiError> {
        match result {
            Ok(v) => {
                let keys = self.lock_cache().invalidate_endpoint(endpoint);
                self.schedule_reconcile(keys);
                Ok(v)
            }
            Err(e) => {
                if !snapshot.is_empty() {
                    tracing::warn!(endpoint, error = %e, "mutation failed, rolling back cached lists");
                }
                let mut keys: Vec<CacheKey> = snapshot.keys().cloned().collect();
                let restored = self.lock_cache().restore(endpoint, snapshot);
                if !restored {
                    tracing::warn!(endpoint, "cached lists changed since the mutation began, refetching instead");
                    let dropped = self.lock_cache().invalidate_endpoint(endpoint);
                    for key in dropped {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                    self.schedule_reconcile(keys);
                }
                Err(e)
            }
        }
    }

    /// Refetch invalidated lists after a short delay so placeholders give way to server data.
    /// A refetch overtaken by a later mutation is discarded; that mutation reconciles on its own.
    fn schedule_reconcile(&self, keys: Vec<CacheKey>) {
        if keys.is_empty() {
            return;
        }
        let client = self.clone();
        let delay = self.inner.settings.reconcile_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for key in keys {
                if let Err(e) = client
                    .refetch(&key.endpoint, &key.filters, &AbortSignal::never())
                    .await
                {
                    tracing::debug!(endpoint = %key.endpoint, error = %e, "reconcile refetch failed");
                }
            }
        });
    }

    fn require_token(&self) -> Result<String, ApiError> {
        self.inner.session.token().ok_or_else(ApiError::missing_token)
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        query: Vec<(String, String)>,
        body: Option<Value>,
        abort: &AbortSignal,
    ) -> Result<Option<Value>, ApiError> {
        let token = self.require_token()?;
        let request = ApiRequest {
            method,
            path,
            query,
            body,
            token,
        };
        let settings = &self.inner.settings;
        let mut attempt = 0u32;
        loop {
            if abort.is_aborted() {
                return Err(ApiError::cancelled());
            }
            tracing::debug!(
                method = request.method.as_str(),
                path = %request.path,
                query = ?request.query,
                attempt,
                "api request"
            );
            let outcome = tokio::select! {
                _ = abort.cancelled() => Err(ApiError::cancelled()),
                r = tokio::time::timeout(settings.timeout, self.inner.transport.execute(&request)) => match r {
                    Ok(r) => r,
                    Err(_) => Err(ApiError::timeout()),
                },
            };
            match outcome.and_then(into_body) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < settings.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        method = request.method.as_str(),
                        path = %request.path,
                        attempt,
                        error = %e,
                        "retrying request"
                    );
                    tokio::select! {
                        _ = abort.cancelled() => return Err(ApiError::cancelled()),
                        _ = tokio::time::sleep(settings.retry_backoff * attempt) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, ListCache> {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn entity_path(endpoint: &str, id: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), id)
}

fn into_body(resp: ApiResponse) -> Result<Option<Value>, ApiError> {
    if resp.is_success() {
        Ok(resp.body)
    } else {
        let message = resp.body.as_ref().and_then(error_message);
        Err(ApiError::from_status(resp.status, message))
    }
}

fn decode_record(body: Option<Value>) -> Result<Record, ApiError> {
    let body = body.ok_or_else(|| ApiError::decode("empty response"))?;
    decode_one(body).map_err(|e| ApiError::decode(format!("record response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::testing::{MockTransport, Scripted};
    use super::*;
    use crate::error::ApiErrorKind;
    use serde_json::json;
    use std::time::Duration;

    fn client(mock: &Arc<MockTransport>) -> DataClient {
        DataClient::with_transport(
            mock.clone(),
            ClientSettings::default(),
            SessionContext::with_session("tok", "admin"),
        )
    }

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    fn seeded() -> Arc<MockTransport> {
        let mock = Arc::new(MockTransport::new());
        mock.seed(
            "users",
            vec![
                json!({ "_id": "u1", "name": "Ann", "role": "auditor" }),
                json!({ "_id": "u2", "name": "Bo", "role": "admin" }),
            ],
        );
        mock
    }

    #[tokio::test]
    async fn missing_token_is_a_precondition_failure() {
        let mock = seeded();
        let client = DataClient::with_transport(mock.clone(), ClientSettings::default(), SessionContext::new());
        let err = client
            .list("users", &FilterSet::new(), &AbortSignal::never())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::MissingToken);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn every_request_carries_the_bearer_token() {
        let mock = seeded();
        let client = client(&mock);
        client
            .get_by_id("users", "u1", &AbortSignal::never())
            .await
            .expect("get");
        let reqs = mock.requests();
        assert_eq!(reqs[0].token, "tok");
        assert_eq!(reqs[0].path, "users/u1");
    }

    #[tokio::test]
    async fn list_is_cached_per_filter_set() {
        let mock = seeded();
        let client = client(&mock);
        let never = AbortSignal::never();
        let admins = FilterSet::new().with("role", "admin");
        let first = client.list("users", &admins, &never).await.expect("list");
        assert_eq!(first.count, 1);
        client.list("users", &admins, &never).await.expect("list");
        client.list("users", &FilterSet::new(), &never).await.expect("list");
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(
            mock.requests()[0].query,
            vec![("role".to_string(), "admin".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_list_reflects_the_new_record() {
        let mock = seeded();
        let client = client(&mock);
        let never = AbortSignal::never();
        let all = FilterSet::new();
        assert_eq!(client.list("users", &all, &never).await.expect("list").count, 2);

        let created = client
            .create("users", obj(json!({ "name": "Cy", "role": "viewer" })))
            .await
            .expect("create");
        assert!(created["_id"].as_str().map(|id| !is_temp_id(id)).unwrap_or(false));

        let after = client.list("users", &all, &never).await.expect("list");
        assert_eq!(after.count, 3);
        assert!(after.ids().iter().all(|id| !is_temp_id(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_then_list_drops_the_record() {
        let mock = seeded();
        let client = client(&mock);
        let never = AbortSignal::never();
        client.list("users", &FilterSet::new(), &never).await.expect("list");
        client.delete("users", "u1").await.expect("delete");
        let after = client.list("users", &FilterSet::new(), &never).await.expect("list");
        assert_eq!(after.count, 1);
        assert_eq!(after.ids(), vec!["u2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn create_is_visible_optimistically_before_the_server_answers() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        client.list("users", &all, &AbortSignal::never()).await.expect("list");
        mock.set_delay(Duration::from_secs(2));

        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.create("users", obj(json!({ "name": "Cy" }))).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let during = client.cached("users", &all).expect("cached");
        assert_eq!(during.count, 3);
        assert!(is_temp_id(during.ids()[2]));

        pending.await.expect("join").expect("create");
        assert!(client.cached("users", &all).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_rolls_back_to_the_exact_snapshot() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        let before = client.list("users", &all, &AbortSignal::never()).await.expect("list");
        mock.script(Scripted::Status(422, Some(json!({ "message": "Email already exists" }))));

        let err = client
            .create("users", obj(json!({ "name": "Dup" })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
        assert_eq!(client.cached("users", &all), Some(before));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delete_restores_the_row() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        client.list("users", &all, &AbortSignal::never()).await.expect("list");
        mock.script(Scripted::Status(403, Some(json!({ "message": "Forbidden" }))));
        let err = client.delete("users", "u2").await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(client.cached("users", &all).map(|l| l.ids().len()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_update_restores_previous_fields() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        let before = client.list("users", &all, &AbortSignal::never()).await.expect("list");
        mock.script(Scripted::Status(422, Some(json!({ "message": "Role is locked" }))));

        let err = client
            .update("users", "u1", obj(json!({ "role": "admin", "name": "Annie" })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Client);
        let cached = client.cached("users", &all).expect("cached");
        assert_eq!(cached, before);
        assert_eq!(cached.find("u1").map(|r| r["role"].clone()), Some(json!("auditor")));
    }

    #[tokio::test(start_paused = true)]
    async fn list_started_before_a_mutation_does_not_repopulate_the_cache() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        mock.set_method_delay(Method::Get, Duration::from_millis(200));

        let early = {
            let client = client.clone();
            let all = all.clone();
            tokio::spawn(async move { client.refetch("users", &all, &AbortSignal::never()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.create("users", obj(json!({ "name": "Cy" }))).await.expect("create");

        assert_eq!(early.await.expect("join").expect("early list").count, 2);
        assert!(client.cached("users", &all).is_none());
        assert_eq!(client.list("users", &all, &AbortSignal::never()).await.expect("list").count, 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.list("users", &all, &AbortSignal::never()).await.expect("list").count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mutation_does_not_undo_a_concurrent_one() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        client.list("users", &all, &AbortSignal::never()).await.expect("list");
        mock.set_method_delay(Method::Post, Duration::from_millis(200));
        mock.script(Scripted::Status(422, Some(json!({ "message": "Email already exists" }))));

        let failing = {
            let client = client.clone();
            tokio::spawn(async move { client.create("users", obj(json!({ "name": "Dup" }))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.delete("users", "u2").await.expect("delete");
        assert!(failing.await.expect("join").is_err());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let after = client.list("users", &all, &AbortSignal::never()).await.expect("list");
        assert_eq!(after.ids(), vec!["u1"]);
        assert_eq!(after.count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried_twice() {
        let mock = seeded();
        let client = client(&mock);
        for _ in 0..3 {
            mock.script(Scripted::Status(500, None));
        }
        let err = client
            .list("users", &FilterSet::new(), &AbortSignal::never())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Server);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_budget() {
        let mock = seeded();
        let client = client(&mock);
        mock.script(Scripted::Error(ApiError::network("connection reset")));
        let list = client
            .list("users", &FilterSet::new(), &AbortSignal::never())
            .await
            .expect("list");
        assert_eq!(list.count, 2);
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn client_and_auth_errors_are_not_retried() {
        let mock = seeded();
        let client = client(&mock);
        mock.script(Scripted::Status(401, None));
        let err = client
            .list("users", &FilterSet::new(), &AbortSignal::never())
            .await
            .unwrap_err();
        assert!(err.is_auth());
        mock.script(Scripted::Status(404, None));
        let err = client
            .get_by_id("users", "nope", &AbortSignal::never())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Client);
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_request_times_out_distinctly() {
        let mock = seeded();
        let settings = ClientSettings {
            max_retries: 0,
            ..ClientSettings::default()
        };
        let client = DataClient::with_transport(mock.clone(), settings, SessionContext::with_session("tok", "admin"));
        mock.script(Scripted::Hang);
        let err = client
            .list("users", &FilterSet::new(), &AbortSignal::never())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_list_is_cancelled_and_not_cached() {
        let mock = seeded();
        let client = client(&mock);
        mock.set_delay(Duration::from_secs(1));
        let controller = AbortController::new();
        let signal = controller.signal();
        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.list("users", &FilterSet::new(), &signal).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.abort();
        let err = pending.await.expect("join").unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert!(client.cached("users", &FilterSet::new()).is_none());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_refetches_invalidated_lists() {
        let mock = seeded();
        let client = client(&mock);
        let all = FilterSet::new();
        client.list("users", &all, &AbortSignal::never()).await.expect("list");
        client
            .update("users", "u1", obj(json!({ "role": "admin" })))
            .await
            .expect("update");
        assert!(client.cached("users", &all).is_none());

        tokio::time::sleep(client.settings().reconcile_delay * 2).await;
        let cached = client.cached("users", &all).expect("refetched");
        assert_eq!(cached.find("u1").map(|r| r["role"].clone()), Some(json!("admin")));
    }
}
