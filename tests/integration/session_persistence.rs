//! Mobile identity and cookie jar across process boundaries

use super::test_utils::ScriptedFetcher;
use chrono::Utc;
use querylab::facts::NoopOperationListener;
use querylab::session::{CookieStore, HeaderOverrides, MemoryCookieStore, MOBILE_COOKIE_HEADER};
use querylab::snapshot::MemorySnapshotBackend;
use querylab::storage::WorkbenchStore;
use querylab::{Fetched, RunOutcome, SessionIdentity, Workbench};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn workbench(fetcher: Arc<ScriptedFetcher>, jar: Arc<MemoryCookieStore>) -> Workbench {
    Workbench::new(
        fetcher,
        jar,
        Arc::new(MemorySnapshotBackend::new()),
        Arc::new(NoopOperationListener),
    )
    .with_cookie_ttl_days(3)
}

fn headers() -> HeaderOverrides {
    let mut headers = HeaderOverrides::new();
    headers.insert(MOBILE_COOKIE_HEADER.to_string(), "device=android".to_string());
    headers
}

/// One CLI invocation: load, act, persist.
fn persist(store: &WorkbenchStore, workbench: &Workbench, jar: &MemoryCookieStore) {
    let mut state = workbench.capture_state();
    state.cookies = jar.entries();
    store.save(&state).unwrap();
}

#[tokio::test]
async fn mobile_round_trip_across_invocations_reissues_cookies() {
    let dir = TempDir::new().unwrap();
    let store = WorkbenchStore::new(dir.path().join("workbench.json"));

    // first invocation: activate mobile with the browser's cookies in the jar
    let jar = Arc::new(MemoryCookieStore::from_cookie_string("sid=abc; theme=dark"));
    let mut first = workbench(ScriptedFetcher::new(), jar.clone());
    first.edit_query("{ me { id } }");
    first.activate_mobile(headers());
    persist(&store, &first, &jar);

    // second invocation: the jar drifted while mobile was active
    let state = store.load().unwrap();
    assert!(state.identity.is_mobile());
    let jar = Arc::new(MemoryCookieStore::from_entries(state.cookies.clone()));
    jar.set_cookie("sid", "hijacked", None);
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Fetched::ready(json!({"data": {"me": {"id": 1}}})));
    let mut second = workbench(fetcher.clone(), jar.clone());
    second.restore_state(&state);

    let outcome = second.run().unwrap().finished().await;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(fetcher.requests()[0].1, Some(headers()));
    persist(&store, &second, &jar);

    // third invocation: leaving mobile puts the captured cookies back
    let state = store.load().unwrap();
    let jar = Arc::new(MemoryCookieStore::from_entries(state.cookies.clone()));
    let mut third = workbench(ScriptedFetcher::new(), jar.clone());
    third.restore_state(&state);
    assert_eq!(third.deactivate_mobile(), 2);
    assert_eq!(third.identity(), &SessionIdentity::Browser);
    assert_eq!(jar.get_cookie("sid").as_deref(), Some("abc"));
    assert_eq!(jar.get_cookie("theme").as_deref(), Some("dark"));

    let expires = jar.entries()["sid"].expires.unwrap();
    let days = (expires - Utc::now()).num_hours() as f64 / 24.0;
    assert!(days > 2.9 && days <= 3.0);

    persist(&store, &third, &jar);
    let state = store.load().unwrap();
    assert_eq!(state.identity, SessionIdentity::Browser);
    assert_eq!(state.query, "{ me { id } }");
}

#[tokio::test]
async fn snapshot_origin_survives_persistence() {
    let dir = TempDir::new().unwrap();
    let store = WorkbenchStore::new(dir.path().join("workbench.json"));
    let backend = Arc::new(MemorySnapshotBackend::new());
    let jar = Arc::new(MemoryCookieStore::from_cookie_string("sid=mine"));

    let mut author = Workbench::new(
        ScriptedFetcher::new(),
        Arc::new(MemoryCookieStore::new()),
        backend.clone(),
        Arc::new(NoopOperationListener),
    );
    author.edit_query("{ feed }");
    author.activate_mobile(headers());
    let url = author.share_snapshot().await.unwrap();

    let mut reader = Workbench::new(
        ScriptedFetcher::new(),
        jar.clone(),
        backend,
        Arc::new(NoopOperationListener),
    );
    reader.open_snapshot_url(&url).await.unwrap();
    persist(&store, &reader, &jar);

    let state = store.load().unwrap();
    assert!(state.from_snapshot);
    let mut resumed = workbench(ScriptedFetcher::new(), jar.clone());
    resumed.restore_state(&state);
    assert!(resumed.is_from_snapshot());
    assert_eq!(resumed.deactivate_mobile(), 0);
    assert_eq!(jar.cookie_string(), "sid=mine");
}

#[test]
fn corrupt_state_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workbench.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = WorkbenchStore::new(&path).load().unwrap_err();
    assert!(err.to_string().starts_with("Session store is corrupt"));
}
