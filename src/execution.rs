//! Execution Coordinator
//!
//! Owns the generation counter, the last visible response, the waiting flag and the
//! handle of an in-flight stream. Every run takes a ticket (the new generation) by value
//! into its task; when a result arrives the task compares its ticket with the current
//! generation under the state lock and drops the result if a newer run or a stop has
//! happened since. Only the current generation ever mutates visible state.
//!
//! A new run cancels a still-active stream from the run it supersedes.

use crate::document::QueryDocument;
use crate::error::{ExecutionError, TransportError};
use crate::facts::OperationListener;
use crate::session::HeaderOverrides;
use crate::transport::{dispatch, Execution, Fetcher, ResponseStream};
use futures::stream::{self, AbortHandle, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identity of one run
pub type Generation = u64;

/// Handle of an in-flight stream
#[derive(Debug)]
pub struct ActiveExecution {
    generation: Generation,
    abort: AbortHandle,
}

impl ActiveExecution {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn cancel(self) {
        debug!(generation = self.generation, "cancelling active stream");
        self.abort.abort();
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    generation: Generation,
    waiting: bool,
    response: Option<String>,
    active: Option<ActiveExecution>,
}

impl CoordinatorState {
    fn is_current(&self, ticket: Generation) -> bool {
        self.generation == ticket
    }

    /// Start a new generation, cancelling any stream of the previous one.
    fn supersede(&mut self) -> Generation {
        self.generation += 1;
        if let Some(active) = self.active.take() {
            active.cancel();
        }
        self.generation
    }

    fn clear_active(&mut self, ticket: Generation) {
        if self
            .active
            .as_ref()
            .map_or(false, |active| active.generation == ticket)
        {
            self.active = None;
        }
    }
}

/// Read-only view of coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionView {
    pub generation: Generation,
    pub waiting: bool,
    pub response: Option<String>,
    pub streaming: bool,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Result(s) applied and the run finished
    Completed,
    /// Failed; the error text is now the visible response
    Failed(String),
    /// A newer run or a stop took over before a result could be applied
    Superseded,
    /// The stream was cancelled
    Cancelled,
}

/// A dispatched run
#[derive(Debug)]
pub struct RunHandle {
    generation: Generation,
    operation_name: Option<String>,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Operation name the run was dispatched with.
    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Wait for the run's task to finish.
    pub async fn finished(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => RunOutcome::Cancelled,
            Err(e) => RunOutcome::Failed(e.to_string()),
        }
    }
}

/// Input to a run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub document: QueryDocument,
    /// Operation explicitly chosen for this run (e.g. the one under the cursor)
    pub selected_operation: Option<String>,
    /// Header overrides of the active session, if any
    pub headers: Option<HeaderOverrides>,
}

fn render_response(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Dispatches runs and gates their results by generation.
pub struct ExecutionCoordinator {
    fetcher: Arc<dyn Fetcher>,
    listener: Arc<dyn OperationListener>,
    state: Arc<Mutex<CoordinatorState>>,
}

impl ExecutionCoordinator {
    pub fn new(fetcher: Arc<dyn Fetcher>, listener: Arc<dyn OperationListener>) -> Self {
        Self {
            fetcher,
            listener,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn view(&self) -> ExecutionView {
        let state = self.state.lock();
        ExecutionView {
            generation: state.generation,
            waiting: state.waiting,
            response: state.response.clone(),
            streaming: state.active.is_some(),
        }
    }

    pub fn response(&self) -> Option<String> {
        self.state.lock().response.clone()
    }

    pub fn is_waiting(&self) -> bool {
        self.state.lock().waiting
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Show text as the response without touching in-flight runs.
    pub fn present_response(&self, text: impl Into<String>) {
        self.state.lock().response = Some(text.into());
    }

    /// Replace the response authoritatively: in-flight runs are superseded first so a late
    /// result cannot overwrite it.
    pub fn restore_response(&self, text: Option<String>) {
        let mut state = self.state.lock();
        state.supersede();
        state.waiting = false;
        state.response = text;
    }

    /// Start a run. Must be called inside a tokio runtime.
    ///
    /// Fails without dispatching when the variables text is invalid; the error text
    /// becomes the visible response.
    pub fn run(&self, request: RunRequest) -> Result<RunHandle, ExecutionError> {
        let RunRequest {
            document,
            selected_operation,
            headers,
        } = request;

        let mut operation_name = document.operation_name.clone();
        if let Some(selected) = selected_operation {
            if operation_name.as_deref() != Some(selected.as_str()) {
                self.listener.on_edit_operation_name(Some(&selected));
                operation_name = Some(selected);
            }
        }

        let mut wire = document;
        wire.operation_name = operation_name.clone();

        let (generation, graphql) = {
            let mut state = self.state.lock();
            let generation = state.supersede();
            match wire.to_request() {
                Ok(graphql) => {
                    state.waiting = true;
                    state.response = None;
                    (generation, graphql)
                }
                Err(e) => {
                    warn!(generation, error = %e, "run rejected before dispatch");
                    state.waiting = false;
                    state.response = Some(e.to_string());
                    return Err(e);
                }
            }
        };

        debug!(
            generation,
            operation = ?operation_name,
            mobile = headers.is_some(),
            "dispatching run"
        );

        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            match dispatch(fetcher.as_ref(), graphql, headers).await {
                Ok(Execution::Single(single)) => {
                    let result = single.await;
                    apply_single(&state, generation, result)
                }
                Ok(Execution::Stream(stream)) => drive_stream(&state, generation, stream).await,
                Err(e) => apply_failure(&state, generation, e),
            }
        });

        Ok(RunHandle {
            generation,
            operation_name,
            task,
        })
    }

    /// Stop the current run. Cancels the active stream, if any, exactly once; a pending
    /// single result is discarded when it arrives. The visible response is kept.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        let generation = state.supersede();
        state.waiting = false;
        info!(generation, "run stopped");
    }
}

fn apply_single(
    state: &Mutex<CoordinatorState>,
    ticket: Generation,
    result: Result<Value, TransportError>,
) -> RunOutcome {
    match result {
        Ok(value) => {
            let mut state = state.lock();
            if !state.is_current(ticket) {
                debug!(generation = ticket, current = state.generation, "discarding stale result");
                return RunOutcome::Superseded;
            }
            state.waiting = false;
            state.response = Some(render_response(&value));
            RunOutcome::Completed
        }
        Err(e) => apply_failure(state, ticket, e),
    }
}

fn apply_failure(
    state: &Mutex<CoordinatorState>,
    ticket: Generation,
    error: TransportError,
) -> RunOutcome {
    let mut state = state.lock();
    if !state.is_current(ticket) {
        debug!(generation = ticket, error = %error, "discarding stale failure");
        return RunOutcome::Superseded;
    }
    warn!(generation = ticket, error = %error, "run failed");
    let text = error.to_string();
    state.waiting = false;
    state.clear_active(ticket);
    state.response = Some(text.clone());
    RunOutcome::Failed(text)
}

async fn drive_stream(
    state: &Mutex<CoordinatorState>,
    ticket: Generation,
    stream: ResponseStream,
) -> RunOutcome {
    let (mut stream, abort) = stream::abortable(stream);
    {
        let mut state = state.lock();
        if !state.is_current(ticket) {
            // superseded while the fetcher was still connecting; dropping closes it
            return RunOutcome::Superseded;
        }
        state.active = Some(ActiveExecution {
            generation: ticket,
            abort,
        });
    }

    let mut emissions = 0usize;
    while let Some(item) = stream.next().await {
        match item {
            Ok(value) => {
                let mut state = state.lock();
                if !state.is_current(ticket) {
                    return RunOutcome::Superseded;
                }
                emissions += 1;
                // still waiting: only completion or error ends the run
                state.response = Some(render_response(&value));
            }
            Err(e) => return apply_failure(state, ticket, e),
        }
    }

    let mut state = state.lock();
    if !state.is_current(ticket) {
        debug!(generation = ticket, emissions, "stream cancelled");
        return RunOutcome::Cancelled;
    }
    debug!(generation = ticket, emissions, "stream completed");
    state.waiting = false;
    state.clear_active(ticket);
    RunOutcome::Completed
}
