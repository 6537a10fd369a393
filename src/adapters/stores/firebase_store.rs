use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value};

use crate::adapters::stores::event_stream::{
    EventStreamParser, PathData, ServerEvent, apply_patch, apply_put,
};
use crate::core::errors::{AccessDeskError, Result};
use crate::core::models::collection::{Collection, Snapshot, StoreNotification, limit_to_last};
use crate::core::traits::record_store::{RecordStore, Subscription};

/// How often the streaming loop wakes up to check for cancellation.
const CANCEL_CHECK: Duration = Duration::from_millis(500);

/// Record store backed by the Firebase Realtime Database REST API.
///
/// Reads and writes are one request each; subscriptions hold a
/// `text/event-stream` connection open on a background thread.
pub struct FirebaseStore {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl FirebaseStore {
    /// Create a store for the database at `base_url`
    /// (e.g. `https://my-project-default-rtdb.firebaseio.com`).
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            timeout,
        }
    }

    /// REST endpoint for `segments` below the database root.
    ///
    /// Every segment is percent-encoded on its own, so a key containing
    /// `?`, `%` or spaces always names exactly one child.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let invalid = |detail: String| AccessDeskError::InvalidConfig { detail };
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("invalid database url '{}': {e}", self.base_url)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| invalid(format!("database url '{}' cannot hold a path", self.base_url)))?;
            path.pop_if_empty();
            match segments.split_last() {
                Some((last, parents)) => {
                    path.extend(parents.iter().copied());
                    path.push(&format!("{last}.json"));
                }
                None => {
                    path.push(".json");
                }
            }
        }
        Ok(url)
    }

    fn auth_query(&self) -> Vec<(&'static str, String)> {
        self.auth_token
            .iter()
            .map(|token| ("auth", token.clone()))
            .collect()
    }

    fn runtime(operation: &str) -> Result<tokio::runtime::Runtime> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AccessDeskError::store(operation, format!("cannot start async runtime: {e}")))
    }

    fn client(&self, operation: &str) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("accessdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AccessDeskError::store(operation, format!("cannot create HTTP client: {e}")))
    }

    /// Send one request and decode the JSON body.
    fn request(
        &self,
        operation: &str,
        method: reqwest::Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value> {
        let client = self.client(operation)?;
        let url = self.url(segments)?;
        tracing::debug!(%method, %url, "firebase request");

        Self::runtime(operation)?.block_on(async {
            let mut req = client.request(method, url).query(&self.auth_query());
            if let Some(body) = body {
                req = req.json(body);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| AccessDeskError::store(operation, format!("request failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let detail = resp.text().await.unwrap_or_default();
                return Err(AccessDeskError::store(
                    operation,
                    format!("server returned {status}: {}", detail.trim()),
                ));
            }

            resp.json::<Value>()
                .await
                .map_err(|e| AccessDeskError::store(operation, format!("invalid response: {e}")))
        })
    }
}

/// Turn a collection read into a snapshot. `null` means the collection is empty.
fn into_snapshot(operation: &str, value: Value) -> Result<Snapshot> {
    match value {
        Value::Null => Ok(Snapshot::new()),
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(AccessDeskError::store(
            operation,
            format!("expected an object, found {other}"),
        )),
    }
}

impl RecordStore for FirebaseStore {
    fn get_all(&self, collection: Collection) -> Result<Snapshot> {
        let value = self.request("read", reqwest::Method::GET, &[collection.path()], None)?;
        into_snapshot("read", value)
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let value = self.request("read", reqwest::Method::GET, &[collection.path(), key], None)?;
        Ok((!value.is_null()).then_some(value))
    }

    fn set(&self, collection: Collection, key: &str, value: Value) -> Result<()> {
        self.request(
            "write",
            reqwest::Method::PUT,
            &[collection.path(), key],
            Some(&value),
        )?;
        Ok(())
    }

    fn update_fields(
        &self,
        collection: Collection,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<()> {
        self.request(
            "update",
            reqwest::Method::PATCH,
            &[collection.path(), key],
            Some(&Value::Object(fields)),
        )?;
        Ok(())
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        self.request(
            "delete",
            reqwest::Method::DELETE,
            &[collection.path(), key],
            None,
        )?;
        Ok(())
    }

    fn subscribe(
        &self,
        collection: Collection,
        limit: Option<usize>,
        sink: Sender<StoreNotification>,
    ) -> Result<Subscription> {
        let mut query = self.auth_query();
        if let Some(limit) = limit {
            query.push(("orderBy", "\"$key\"".to_string()));
            query.push(("limitToLast", limit.to_string()));
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let listener = StreamListener {
            url: self.url(&[collection.path()])?,
            query,
            connect_timeout: self.timeout,
            collection,
            limit,
            cancelled: Arc::clone(&cancelled),
            sink,
        };
        std::thread::Builder::new()
            .name(format!("stream-{collection}"))
            .spawn(move || listener.run())?;

        Ok(Subscription::new(collection, move || {
            cancelled.store(true, Ordering::Relaxed);
        }))
    }

    fn name(&self) -> &str {
        "firebase"
    }
}

/// Owns one streaming connection and keeps the collection snapshot current.
struct StreamListener {
    url: Url,
    query: Vec<(&'static str, String)>,
    connect_timeout: Duration,
    collection: Collection,
    limit: Option<usize>,
    cancelled: Arc<AtomicBool>,
    sink: Sender<StoreNotification>,
}

/// Why the stream loop stopped.
#[derive(Debug, PartialEq)]
enum StreamEnd {
    Cancelled,
    Failed(String),
}

/// Effect of one server event on the collection snapshot.
#[derive(Debug, PartialEq)]
enum StreamStep {
    Unchanged,
    Changed,
    End(StreamEnd),
}

/// Apply one server event to `snapshot`, keeping at most `limit` keys.
fn apply_event(snapshot: &mut Snapshot, limit: Option<usize>, event: &ServerEvent) -> StreamStep {
    match event.event.as_str() {
        "put" | "patch" => {
            let change: PathData = match serde_json::from_str(&event.data) {
                Ok(change) => change,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring undecodable stream event");
                    return StreamStep::Unchanged;
                }
            };
            if event.event == "put" {
                apply_put(snapshot, &change.path, change.data);
            } else {
                apply_patch(snapshot, &change.path, change.data);
            }
            *snapshot = limit_to_last(std::mem::take(snapshot), limit);
            StreamStep::Changed
        }
        "keep-alive" => StreamStep::Unchanged,
        "cancel" => StreamStep::End(StreamEnd::Failed(format!(
            "access cancelled by the database: {}",
            event.data
        ))),
        "auth_revoked" => {
            StreamStep::End(StreamEnd::Failed("auth token revoked or expired".into()))
        }
        other => {
            tracing::debug!(event = other, "ignoring stream event");
            StreamStep::Unchanged
        }
    }
}

impl StreamListener {
    fn run(self) {
        let outcome = match FirebaseStore::runtime("subscribe") {
            Ok(rt) => rt.block_on(self.listen()),
            Err(e) => StreamEnd::Failed(e.to_string()),
        };
        self.report(outcome);
    }

    /// Forward a failure to the consumer. Cancellation is silent.
    fn report(&self, outcome: StreamEnd) {
        if let StreamEnd::Failed(reason) = outcome {
            tracing::error!(collection = %self.collection, %reason, "subscription failed");
            let _ = self.sink.send(StoreNotification::Failed {
                collection: self.collection,
                reason,
            });
        }
    }

    async fn listen(&self) -> StreamEnd {
        // No overall timeout: the response body never ends.
        let client = match reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("accessdesk/", env!("CARGO_PKG_VERSION")))
            .build()
        {
            Ok(client) => client,
            Err(e) => return StreamEnd::Failed(format!("cannot create HTTP client: {e}")),
        };

        let resp = client
            .get(self.url.clone())
            .query(&self.query)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await;
        let mut resp = match resp {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => return StreamEnd::Failed(format!("server returned {}", resp.status())),
            Err(e) => return StreamEnd::Failed(format!("request failed: {e}")),
        };
        tracing::debug!(collection = %self.collection, "stream connected");

        let mut parser = EventStreamParser::new();
        let mut snapshot = Snapshot::new();
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return StreamEnd::Cancelled;
            }

            let chunk = match tokio::time::timeout(CANCEL_CHECK, resp.chunk()).await {
                Err(_elapsed) => continue,
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => return StreamEnd::Failed("stream closed by server".into()),
                Ok(Err(e)) => return StreamEnd::Failed(format!("stream read failed: {e}")),
            };

            if let Some(end) = self.process_chunk(&mut parser, &mut snapshot, &chunk) {
                return end;
            }
        }
    }

    /// Feed one network chunk through the parser and send a full snapshot
    /// after every change. Returns why the stream must stop, if it must.
    fn process_chunk(
        &self,
        parser: &mut EventStreamParser,
        snapshot: &mut Snapshot,
        chunk: &[u8],
    ) -> Option<StreamEnd> {
        for event in parser.feed(chunk) {
            match apply_event(snapshot, self.limit, &event) {
                StreamStep::Unchanged => {}
                StreamStep::Changed => {
                    let sent = self.sink.send(StoreNotification::Snapshot {
                        collection: self.collection,
                        entries: snapshot.clone(),
                    });
                    if sent.is_err() {
                        return Some(StreamEnd::Cancelled);
                    }
                }
                StreamStep::End(end) => return Some(end),
            }
        }
        None
    }
}
