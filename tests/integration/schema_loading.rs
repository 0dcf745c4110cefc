//! Schema introspection through the workbench

use super::test_utils::{controlled_stream, ScriptedFetcher};
use querylab::facts::NoopOperationListener;
use querylab::schema::SchemaState;
use querylab::session::MemoryCookieStore;
use querylab::snapshot::MemorySnapshotBackend;
use querylab::{Fetched, Workbench};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn workbench(fetcher: Arc<ScriptedFetcher>) -> Workbench {
    Workbench::new(
        fetcher,
        Arc::new(MemoryCookieStore::new()),
        Arc::new(MemorySnapshotBackend::new()),
        Arc::new(NoopOperationListener),
    )
}

fn introspection_result() -> Value {
    json!({
        "data": {
            "__schema": {
                "queryType": {"name": "Query"},
                "mutationType": null,
                "types": [{"name": "Query"}, {"name": "PhotoInput"}]
            }
        }
    })
}

#[tokio::test]
async fn retries_without_subscriptions_when_first_result_has_no_data() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Fetched::ready(json!({
        "errors": [{"message": "Cannot query field \"subscriptionType\" on type \"__Schema\"."}]
    })));
    fetcher.push(Fetched::ready(introspection_result()));
    let mut workbench = workbench(fetcher.clone());

    assert!(workbench.load_schema().await);

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].0.query.contains("subscriptionType"));
    assert!(!requests[1].0.query.contains("subscriptionType"));

    let schema = workbench.schema().schema().unwrap();
    assert!(schema.has_type("PhotoInput"));
    assert_eq!(schema.query_type(), Some("Query"));
    assert_eq!(workbench.response(), None);
}

#[tokio::test]
async fn loaded_schema_resolves_variable_types() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Fetched::ready(introspection_result()));
    let mut workbench = workbench(fetcher.clone());
    workbench.edit_query("query P($input: PhotoInput) { photo(input: $input) { url } }");
    assert!(workbench.facts().is_none());

    assert!(workbench.load_schema().await);

    assert_eq!(fetcher.request_count(), 1);
    let facts = workbench.facts().unwrap();
    assert_eq!(
        facts.variable_to_type.get("input").map(String::as_str),
        Some("PhotoInput")
    );
    assert_eq!(workbench.operation_name(), Some("P"));
}

#[tokio::test]
async fn streamed_introspection_uses_the_first_value() {
    let fetcher = ScriptedFetcher::new();
    let (tx, drops, fetched) = controlled_stream();
    tx.unbounded_send(Ok(introspection_result())).unwrap();
    fetcher.push(fetched);
    let mut workbench = workbench(fetcher.clone());

    assert!(workbench.load_schema().await);

    assert_eq!(fetcher.request_count(), 1);
    assert!(workbench.schema().schema().unwrap().has_type("PhotoInput"));
    // the rest of the stream is never consumed
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(tx.is_closed());
}

#[tokio::test]
async fn unrecognized_fetcher_output_leaves_schema_absent() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Fetched::Unrecognized("x".to_string()));
    let mut workbench = workbench(fetcher.clone());

    assert!(workbench.load_schema().await);

    assert!(matches!(workbench.schema(), SchemaState::Absent));
    assert_eq!(
        workbench.response().as_deref(),
        Some("fetcher returned neither a Single nor a Stream: x")
    );
    assert_eq!(fetcher.request_count(), 1);
}

#[tokio::test]
async fn data_less_results_are_shown_in_place_of_a_response() {
    let fetcher = ScriptedFetcher::new();
    let failure = json!({"errors": [{"message": "introspection disabled"}]});
    fetcher.push(Fetched::ready(failure.clone()));
    fetcher.push(Fetched::ready(failure.clone()));
    let mut workbench = workbench(fetcher.clone());

    assert!(workbench.load_schema().await);

    assert!(matches!(workbench.schema(), SchemaState::Absent));
    assert_eq!(
        workbench.response(),
        Some(serde_json::to_string_pretty(&failure).unwrap())
    );
    assert_eq!(fetcher.request_count(), 2);
}
