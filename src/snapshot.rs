//! Snapshot Codec
//!
//! A snapshot bundles everything needed to replay an interaction elsewhere: the query,
//! its variables text, the response text and the mobile identity in effect. The wire
//! shape is a flat JSON object of strings.

use crate::document::QueryDocument;
use crate::error::SnapshotError;
use crate::session::{HeaderOverrides, SessionIdentity, MOBILE_COOKIE_HEADER};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub mod service;

pub use service::{
    snapshot_id_from_url, snapshot_url, GraphQLSnapshotBackend, MemorySnapshotBackend,
    SnapshotBackend,
};

/// Field in a mobile API response that marks a successful mobile call
pub const MOBILE_SUCCESS_MARKER: &str = "Ack";

/// Persisted interaction bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub query: String,
    pub variables: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub response: Option<String>,
    pub mobile_cookies: Option<String>,
    pub mobile_headers: Option<String>,
    pub browser_cookies: Option<String>,
}

impl Snapshot {
    /// Capture the current interaction. The ambient browser cookies are never captured.
    pub fn capture(
        document: &QueryDocument,
        response: Option<&str>,
        identity: &SessionIdentity,
    ) -> Result<Self, SnapshotError> {
        if !document.looks_like_query() {
            return Err(SnapshotError::MissingQuery);
        }

        let mobile_headers = match identity.headers() {
            Some(headers) => Some(
                serde_json::to_string(headers).map_err(|e| SnapshotError::Encode(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            query: document.text.clone(),
            variables: document.variables.clone(),
            operation_name: document.operation_name.clone(),
            response: response.map(str::to_string),
            mobile_cookies: identity.mobile_cookie().map(str::to_string),
            mobile_headers,
            browser_cookies: None,
        })
    }

    /// The blob a storage backend keeps in its single header/cookie column.
    pub fn header_blob(&self) -> Option<&str> {
        self.mobile_headers
            .as_deref()
            .or(self.mobile_cookies.as_deref())
    }
}

/// State reconstructed from a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSnapshot {
    pub document: QueryDocument,
    pub response: Option<String>,
    pub identity: SessionIdentity,
    /// Set on every decode; cleared by the next explicit run
    pub from_snapshot: bool,
}

/// Encode the interaction into an opaque payload.
pub fn encode(
    document: &QueryDocument,
    response: Option<&str>,
    identity: &SessionIdentity,
) -> Result<String, SnapshotError> {
    let snapshot = Snapshot::capture(document, response, identity)?;
    serde_json::to_string(&snapshot).map_err(|e| SnapshotError::Encode(e.to_string()))
}

/// Decode a payload. Also accepts the storage backend's record shape, where the header
/// blob lives in `mobileCookies`.
pub fn decode(payload: &str) -> Result<DecodedSnapshot, SnapshotError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    let record = value
        .as_object()
        .ok_or_else(|| SnapshotError::Decode("snapshot payload is not a JSON object".to_string()))?;

    let query = match record.get("query") {
        Some(Value::String(query)) => query.clone(),
        _ => return Err(SnapshotError::MissingField("query")),
    };

    let variables = text_field(record, "variables");
    let response = text_field(record, "response");
    let mobile_cookies = non_empty(text_field(record, "mobileCookies"));
    let mobile_headers = non_empty(text_field(record, "mobileHeaders"));
    let browser_cookies = non_empty(text_field(record, "browserCookies"));

    let mobile = mobile_cookies.is_some()
        || mobile_headers.is_some()
        || response.as_deref().map_or(false, has_success_marker);

    let identity = if mobile {
        let mut headers = mobile_headers
            .as_deref()
            .or(mobile_cookies.as_deref())
            .map(parse_header_blob)
            .unwrap_or_default();
        if let Some(cookie) = &mobile_cookies {
            if mobile_headers.is_some() && !headers.contains_key(MOBILE_COOKIE_HEADER) {
                headers.insert(MOBILE_COOKIE_HEADER.to_string(), cookie.clone());
            }
        }
        SessionIdentity::Mobile {
            headers,
            cookie_snapshot: browser_cookies,
        }
    } else {
        SessionIdentity::Browser
    };
    debug!(mobile, "snapshot decoded");

    Ok(DecodedSnapshot {
        document: QueryDocument {
            text: query,
            variables,
            operation_name: text_field(record, "operationName"),
        },
        response,
        identity,
        from_snapshot: true,
    })
}

fn text_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Whether a response text carries the mobile success marker.
pub fn has_success_marker(response: &str) -> bool {
    serde_json::from_str::<Value>(response)
        .ok()
        .and_then(|value| value.get(MOBILE_SUCCESS_MARKER).cloned())
        .map_or(false, |ack| match ack {
            Value::Null | Value::Bool(false) => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
}

/// Parse a stored header blob. A JSON object becomes the header map; anything else is
/// taken to be a raw mobile cookie line.
pub fn parse_header_blob(blob: &str) -> HeaderOverrides {
    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, value)
            })
            .collect(),
        _ => {
            let mut headers = HeaderOverrides::new();
            headers.insert(MOBILE_COOKIE_HEADER.to_string(), blob.to_string());
            headers
        }
    }
}
