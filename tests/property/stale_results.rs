//! Stale-result suppression over arbitrary arrival orders

use async_trait::async_trait;
use futures::channel::oneshot;
use parking_lot::Mutex;
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use querylab::error::TransportError;
use querylab::facts::NoopOperationListener;
use querylab::session::HeaderOverrides;
use querylab::{ExecutionCoordinator, Fetched, Fetcher, GraphQLRequest, QueryDocument, RunOutcome, RunRequest};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

type Reply = Result<Value, TransportError>;

/// Hands out one pending reply per fetch, in fetch order.
#[derive(Default)]
struct Pending {
    replies: Mutex<VecDeque<Fetched>>,
    fetches: Mutex<usize>,
}

#[async_trait]
impl Fetcher for Pending {
    async fn fetch(&self, _request: GraphQLRequest, _headers: Option<HeaderOverrides>) -> Fetched {
        *self.fetches.lock() += 1;
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Fetched::failed(TransportError::Remote("exhausted".to_string())))
    }
}

fn rendered(index: usize) -> String {
    serde_json::to_string_pretty(&json!({"data": {"run": index}})).unwrap()
}

fn arrival_orders() -> impl Strategy<Value = Vec<usize>> {
    (2usize..6).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

#[test]
fn test_only_latest_run_sets_the_response() {
    let mut runner = TestRunner::new(Config {
        cases: 64,
        ..Config::default()
    });

    runner
        .run(&arrival_orders(), |order| {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let fetcher = Arc::new(Pending::default());
                let mut senders: Vec<Option<oneshot::Sender<Reply>>> = Vec::new();
                for _ in 0..order.len() {
                    let (tx, rx) = oneshot::channel::<Reply>();
                    fetcher.replies.lock().push_back(Fetched::single(async move {
                        rx.await.unwrap_or_else(|_| Err(TransportError::Remote("dropped".to_string())))
                    }));
                    senders.push(Some(tx));
                }
                let coordinator =
                    ExecutionCoordinator::new(fetcher.clone(), Arc::new(NoopOperationListener));

                let mut handles = Vec::new();
                for i in 0..order.len() {
                    let handle = coordinator
                        .run(RunRequest {
                            document: QueryDocument::new(format!("{{ run{} }}", i)),
                            ..Default::default()
                        })
                        .unwrap();
                    while *fetcher.fetches.lock() <= i {
                        tokio::task::yield_now().await;
                    }
                    handles.push(handle);
                }

                let latest = order.len() - 1;
                let mut latest_arrived = false;
                for &index in &order {
                    if let Some(tx) = senders[index].take() {
                        tx.send(Ok(json!({"data": {"run": index}}))).unwrap();
                    }
                    // let the run's task observe its result
                    for _ in 0..8 {
                        tokio::task::yield_now().await;
                    }
                    latest_arrived |= index == latest;

                    let response = coordinator.response();
                    if latest_arrived {
                        assert_eq!(response, Some(rendered(latest)));
                    } else {
                        assert_eq!(response, None);
                    }
                }

                for (i, handle) in handles.into_iter().enumerate() {
                    let expected = if i == latest {
                        RunOutcome::Completed
                    } else {
                        RunOutcome::Superseded
                    };
                    assert_eq!(handle.finished().await, expected);
                }
                assert_eq!(coordinator.response(), Some(rendered(latest)));
                assert!(!coordinator.is_waiting());
            });

            Ok(())
        })
        .unwrap();
}
