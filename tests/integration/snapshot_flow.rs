//! Snapshot share/open through the workbench

use super::test_utils::ScriptedFetcher;
use async_trait::async_trait;
use querylab::error::SnapshotError;
use querylab::facts::NoopOperationListener;
use querylab::schema::SchemaState;
use querylab::session::{HeaderOverrides, MemoryCookieStore, MOBILE_COOKIE_HEADER};
use querylab::snapshot::{GraphQLSnapshotBackend, MemorySnapshotBackend, Snapshot, SnapshotBackend};
use querylab::{Fetched, SessionIdentity, Workbench};
use serde_json::json;
use std::sync::Arc;

const SHARE_BASE: &str = "https://ide.example.test/graphiql";

fn workbench_with(fetcher: Arc<ScriptedFetcher>, backend: Arc<dyn SnapshotBackend>) -> Workbench {
    Workbench::new(
        fetcher,
        Arc::new(MemoryCookieStore::from_cookie_string("sid=browser")),
        backend,
        Arc::new(NoopOperationListener),
    )
    .with_share_base_url(SHARE_BASE)
}

fn mobile_headers() -> HeaderOverrides {
    let mut headers = HeaderOverrides::new();
    headers.insert(MOBILE_COOKIE_HEADER.to_string(), "device=ios; token=t1".to_string());
    headers.insert("X-App-Version".to_string(), "7.2".to_string());
    headers
}

/// Backend that always serves the same payload
struct FixedPayload(String);

#[async_trait]
impl SnapshotBackend for FixedPayload {
    async fn save(&self, _snapshot: &Snapshot) -> Result<String, SnapshotError> {
        Ok("fixed".to_string())
    }

    async fn load(&self, _id: &str) -> Result<String, SnapshotError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn payload_without_query_leaves_workbench_untouched() {
    let backend = Arc::new(FixedPayload(
        json!({"variables": "{\"id\": 2}", "response": "{}"}).to_string(),
    ));
    let mut workbench = workbench_with(ScriptedFetcher::new(), backend);
    workbench.edit_query("query Keep { keep }");
    workbench.edit_variables(Some("{\"id\": 1}".to_string()));
    workbench.coordinator().present_response("kept response");
    workbench.activate_mobile(mobile_headers());
    let before_document = workbench.document();
    let before_identity = workbench.identity().clone();

    let err = workbench.restore_snapshot("any").await.unwrap_err();
    assert!(matches!(err, SnapshotError::MissingField("query")));

    assert_eq!(workbench.document(), before_document);
    assert_eq!(workbench.identity(), &before_identity);
    assert_eq!(workbench.response().as_deref(), Some("kept response"));
    assert!(!workbench.is_from_snapshot());
}

#[tokio::test]
async fn shared_mobile_snapshot_opens_elsewhere() {
    let backend = Arc::new(MemorySnapshotBackend::new());
    let mut author = workbench_with(ScriptedFetcher::new(), backend.clone());
    author.edit_query("query Profile { me { name } }");
    author.edit_variables(Some("{\"lang\": \"en\"}".to_string()));
    author.activate_mobile(mobile_headers());
    author
        .coordinator()
        .present_response("{\"data\": {\"me\": {\"name\": \"Ada\"}}}");

    let url = author.share_snapshot().await.unwrap();
    assert!(url.starts_with(SHARE_BASE));
    assert!(url.ends_with("snapshot=1"));
    assert_eq!(backend.len(), 1);

    let mut reader = workbench_with(ScriptedFetcher::new(), backend);
    reader.open_snapshot_url(&url).await.unwrap();

    let document = reader.document();
    assert_eq!(document.text, "query Profile { me { name } }");
    assert_eq!(document.variables.as_deref(), Some("{\"lang\": \"en\"}"));
    assert_eq!(
        reader.response().as_deref(),
        Some("{\"data\": {\"me\": {\"name\": \"Ada\"}}}")
    );
    assert!(reader.is_from_snapshot());
    match reader.identity() {
        SessionIdentity::Mobile {
            headers,
            cookie_snapshot,
        } => {
            assert_eq!(headers, &mobile_headers());
            assert_eq!(cookie_snapshot, &None);
        }
        other => panic!("expected mobile identity, got {:?}", other),
    }

    // the restored identity is someone else's; leaving it reissues nothing
    assert_eq!(reader.deactivate_mobile(), 0);
    assert_eq!(reader.identity(), &SessionIdentity::Browser);
}

#[tokio::test]
async fn share_without_query_is_refused() {
    let backend = Arc::new(MemorySnapshotBackend::new());
    let mut workbench = workbench_with(ScriptedFetcher::new(), backend.clone());
    workbench.edit_query("   ");

    let err = workbench.share_snapshot().await.unwrap_err();
    assert_eq!(err.to_string(), "Please make sure the query exists!");
    assert!(backend.is_empty());
}

#[tokio::test]
async fn graphql_backend_saves_and_loads_through_the_fetcher() {
    let fetcher = ScriptedFetcher::new();
    let backend = Arc::new(GraphQLSnapshotBackend::new(fetcher.clone()));
    let mut workbench = workbench_with(fetcher.clone(), backend);
    workbench.edit_query("{ ping }");

    fetcher.push(Fetched::ready(json!({
        "data": {"saveGraphouzzSnapshot": {"status": "SUCCESS", "id": 42}}
    })));
    let url = workbench.share_snapshot().await.unwrap();
    assert_eq!(url, format!("{}?snapshot=42", SHARE_BASE));

    let (save, headers) = fetcher.requests().remove(0);
    assert!(save.query.contains("saveGraphouzzSnapshot"));
    assert!(save.query.contains("\"{ ping }\""));
    assert_eq!(headers, None);

    fetcher.push(Fetched::ready(json!({
        "data": {"getGraphouzzSnapshotById": {
            "id": "42",
            "query": "{ pong }",
            "variables": null,
            "response": "{\"Ack\": \"Success\"}",
            "mobileCookies": null,
            "browserCookies": null
        }}
    })));
    workbench.open_snapshot_url(&url).await.unwrap();

    assert_eq!(workbench.document().text, "{ pong }");
    // the success marker alone marks the interaction as mobile
    assert!(workbench.identity().is_mobile());
    let (load, _) = fetcher.requests().remove(1);
    assert!(load.query.contains("getGraphouzzSnapshotById(id: \"42\")"));
}

#[tokio::test]
async fn rejected_save_reports_backend_failure() {
    let fetcher = ScriptedFetcher::new();
    let backend = Arc::new(GraphQLSnapshotBackend::new(fetcher.clone()));
    let mut workbench = workbench_with(fetcher.clone(), backend);
    workbench.edit_query("{ ping }");
    fetcher.push(Fetched::ready(json!({
        "data": {"saveGraphouzzSnapshot": {"status": "FAILED", "id": null}}
    })));

    let err = workbench.share_snapshot().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Fail to generate snapshotURL due to network or backend error"
    );
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let fetcher = ScriptedFetcher::new();
    let backend = Arc::new(GraphQLSnapshotBackend::new(fetcher.clone()));
    let mut workbench = workbench_with(fetcher.clone(), backend);
    workbench.edit_query("{ stay }");
    fetcher.push(Fetched::ready(json!({"data": {"getGraphouzzSnapshotById": null}})));

    let err = workbench
        .open_snapshot_url(&format!("{}?snapshot=missing", SHARE_BASE))
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::NotFound(id) if id == "missing"));
    assert_eq!(workbench.document().text, "{ stay }");
}

#[tokio::test]
async fn reopening_own_snapshot_keeps_the_selected_operation() {
    let fetcher = ScriptedFetcher::new();
    let backend = Arc::new(GraphQLSnapshotBackend::new(fetcher.clone()));
    let mut workbench = workbench_with(fetcher.clone(), backend);
    workbench.set_schema(SchemaState::Absent);
    workbench.edit_query("query A { a } query B { b }");
    workbench.edit_operation_name(Some("B"));

    fetcher.push(Fetched::ready(json!({
        "data": {"saveGraphouzzSnapshot": {"status": "SUCCESS", "id": "7"}}
    })));
    let url = workbench.share_snapshot().await.unwrap();

    // the stored record has no operation name column
    fetcher.push(Fetched::ready(json!({
        "data": {"getGraphouzzSnapshotById": {
            "id": "7",
            "query": "query A { a } query B { b }",
            "variables": null,
            "response": null,
            "mobileCookies": null,
            "browserCookies": null
        }}
    })));
    workbench.open_snapshot_url(&url).await.unwrap();
    assert_eq!(workbench.operation_name(), Some("B"));

    fetcher.push(Fetched::ready(json!({"data": {"b": 1}})));
    workbench.run().unwrap().finished().await;
    let (sent, _) = fetcher.requests().remove(2);
    assert_eq!(sent.operation_name.as_deref(), Some("B"));
}

#[tokio::test]
async fn shared_selection_travels_with_the_snapshot() {
    let backend = Arc::new(MemorySnapshotBackend::new());
    let mut author = workbench_with(ScriptedFetcher::new(), backend.clone());
    author.set_schema(SchemaState::Absent);
    author.edit_query("query A { a } query B { b }");
    author.edit_operation_name(Some("B"));
    let url = author.share_snapshot().await.unwrap();

    let mut reader = workbench_with(ScriptedFetcher::new(), backend);
    reader.set_schema(SchemaState::Absent);
    reader.open_snapshot_url(&url).await.unwrap();
    assert_eq!(reader.operation_name(), Some("B"));
}

#[tokio::test]
async fn restore_without_a_name_still_selects_an_operation() {
    let backend = Arc::new(FixedPayload(
        json!({"query": "query A { a } query B { b }", "response": null}).to_string(),
    ));
    let mut workbench = workbench_with(ScriptedFetcher::new(), backend);
    workbench.set_schema(SchemaState::Absent);

    workbench.restore_snapshot("any").await.unwrap();
    assert_eq!(workbench.operation_name(), Some("A"));
}
