//! Snapshot persistence: the remote save/load calls and share URLs.
//! The GraphQL backend dogfoods the workbench's own fetcher.

use crate::document::GraphQLRequest;
use crate::error::SnapshotError;
use crate::snapshot::Snapshot;
use crate::transport::{fetch_one, Fetcher};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Query parameter carrying the snapshot id in share URLs
pub const SNAPSHOT_QUERY_PARAM: &str = "snapshot";

const SAVE_SUCCESS: &str = "SUCCESS";

/// Storage for snapshots
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Persist a snapshot, returning its id.
    async fn save(&self, snapshot: &Snapshot) -> Result<String, SnapshotError>;

    /// Load a stored snapshot as a payload accepted by [`crate::snapshot::decode`].
    async fn load(&self, id: &str) -> Result<String, SnapshotError>;
}

/// GraphQL string literal (or `null`).
fn literal(value: Option<&str>) -> String {
    match value {
        Some(text) => Value::from(text).to_string(),
        None => "null".to_string(),
    }
}

/// Snapshot storage exposed by the GraphQL endpoint itself
pub struct GraphQLSnapshotBackend {
    fetcher: Arc<dyn Fetcher>,
}

impl GraphQLSnapshotBackend {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn save_mutation(snapshot: &Snapshot) -> String {
        format!(
            r#"mutation {{
  saveGraphouzzSnapshot(input: {{
    query: {},
    variables: {},
    response: {},
    mobileCookies: {},
    browserCookies: {}
  }}) {{
    status
    id
  }}
}}"#,
            literal(Some(&snapshot.query)),
            literal(snapshot.variables.as_deref()),
            literal(snapshot.response.as_deref()),
            literal(snapshot.header_blob()),
            literal(snapshot.browser_cookies.as_deref()),
        )
    }

    pub fn load_query(id: &str) -> String {
        format!(
            r#"query {{
  getGraphouzzSnapshotById(id: {}) {{
    id
    query
    variables
    response
    mobileCookies
    browserCookies
  }}
}}"#,
            literal(Some(id))
        )
    }
}

#[async_trait]
impl SnapshotBackend for GraphQLSnapshotBackend {
    async fn save(&self, snapshot: &Snapshot) -> Result<String, SnapshotError> {
        let request = GraphQLRequest::query(Self::save_mutation(snapshot));
        let result = fetch_one(self.fetcher.as_ref(), request).await?;

        let saved = &result["data"]["saveGraphouzzSnapshot"];
        if saved["status"].as_str() != Some(SAVE_SUCCESS) {
            warn!(result = %result, "snapshot save rejected");
            return Err(SnapshotError::SaveRejected);
        }
        let id = match &saved["id"] {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return Err(SnapshotError::SaveRejected),
        };
        info!(snapshot_id = %id, "snapshot saved");
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<String, SnapshotError> {
        let request = GraphQLRequest::query(Self::load_query(id));
        let result = fetch_one(self.fetcher.as_ref(), request).await?;

        match &result["data"]["getGraphouzzSnapshotById"] {
            Value::Object(record) => Ok(Value::Object(record.clone()).to_string()),
            _ => Err(SnapshotError::NotFound(id.to_string())),
        }
    }
}

/// Process-local snapshot storage
#[derive(Debug, Default)]
pub struct MemorySnapshotBackend {
    records: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SnapshotBackend for MemorySnapshotBackend {
    async fn save(&self, snapshot: &Snapshot) -> Result<String, SnapshotError> {
        let mut records = self.records.lock();
        let id = (records.len() + 1).to_string();
        // store the backend record shape: one header/cookie column
        let record = json!({
            "id": id,
            "query": snapshot.query,
            "variables": snapshot.variables,
            "operationName": snapshot.operation_name,
            "response": snapshot.response,
            "mobileCookies": snapshot.header_blob(),
            "browserCookies": snapshot.browser_cookies,
        });
        records.insert(id.clone(), record.to_string());
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<String, SnapshotError> {
        self.records
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound(id.to_string()))
    }
}

/// Share URL for a snapshot: `<base>?snapshot=<id>`.
pub fn snapshot_url(base: &str, id: &str) -> Result<String, SnapshotError> {
    let mut url = Url::parse(base).map_err(|e| SnapshotError::InvalidUrl(e.to_string()))?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SNAPSHOT_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(SNAPSHOT_QUERY_PARAM, id);
    Ok(url.to_string())
}

/// Snapshot id carried by a URL, if any.
pub fn snapshot_id_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == SNAPSHOT_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}
