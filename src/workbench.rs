//! Workbench
//!
//! Composition root of the IDE core: the fact cache, the execution coordinator, the
//! session identity and snapshot sharing behind one owner. Editor-like callers hold a
//! `Workbench` and drive it through edits, runs and session switches.

use crate::document::QueryDocument;
use crate::error::{ExecutionError, SnapshotError};
use crate::execution::{ExecutionCoordinator, ExecutionView, RunHandle, RunRequest};
use crate::facts::{operation_at, FactCache, OperationListener, QueryFacts, SourcePosition};
use crate::schema::{introspect, IntrospectionOutcome, SchemaState};
use crate::session::{CookieStore, HeaderOverrides, SessionIdentity, SessionState};
use crate::snapshot::{
    decode, snapshot_id_from_url, snapshot_url, DecodedSnapshot, Snapshot, SnapshotBackend,
};
use crate::storage::WorkbenchState;
use crate::transport::Fetcher;
use std::sync::Arc;
use tracing::{debug, info};

/// Token for one schema load; stale once a schema is supplied or another load starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaLoadTicket(u64);

pub struct Workbench {
    facts: FactCache,
    variables: Option<String>,
    coordinator: ExecutionCoordinator,
    session: SessionState,
    snapshots: Arc<dyn SnapshotBackend>,
    share_base_url: String,
    schema_epoch: u64,
    from_snapshot: bool,
}

impl Workbench {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cookies: Arc<dyn CookieStore>,
        snapshots: Arc<dyn SnapshotBackend>,
        listener: Arc<dyn OperationListener>,
    ) -> Self {
        Self {
            facts: FactCache::new(Arc::clone(&listener)),
            variables: None,
            coordinator: ExecutionCoordinator::new(fetcher, listener),
            session: SessionState::new(cookies),
            snapshots,
            share_base_url: crate::config::DEFAULT_SHARE_BASE_URL.to_string(),
            schema_epoch: 0,
            from_snapshot: false,
        }
    }

    pub fn with_share_base_url(mut self, base: impl Into<String>) -> Self {
        self.share_base_url = base.into();
        self
    }

    pub fn with_cookie_ttl_days(mut self, days: i64) -> Self {
        self.session = self.session.with_cookie_ttl_days(days);
        self
    }

    /// The document as it would be sent now.
    pub fn document(&self) -> QueryDocument {
        QueryDocument {
            text: self.facts.query().to_string(),
            variables: self.variables.clone(),
            operation_name: self.facts.operation_name().map(str::to_string),
        }
    }

    pub fn facts(&self) -> Option<Arc<QueryFacts>> {
        self.facts.facts().cloned()
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.facts.operation_name()
    }

    pub fn schema(&self) -> &SchemaState {
        self.facts.schema()
    }

    pub fn identity(&self) -> &SessionIdentity {
        self.session.identity()
    }

    pub fn is_from_snapshot(&self) -> bool {
        self.from_snapshot
    }

    pub fn coordinator(&self) -> &ExecutionCoordinator {
        &self.coordinator
    }

    pub fn view(&self) -> ExecutionView {
        self.coordinator.view()
    }

    pub fn response(&self) -> Option<String> {
        self.coordinator.response()
    }

    pub fn edit_query(&mut self, text: &str) {
        self.facts.set_query(text);
    }

    pub fn edit_variables(&mut self, variables: Option<String>) {
        self.variables = variables;
    }

    pub fn edit_operation_name(&mut self, name: Option<&str>) {
        self.facts.set_operation_name(name);
    }

    /// Supply a schema directly. Any schema load still underway loses to it.
    pub fn set_schema(&mut self, schema: SchemaState) {
        self.schema_epoch += 1;
        self.facts.set_schema(schema);
    }

    pub fn begin_schema_load(&mut self) -> SchemaLoadTicket {
        self.schema_epoch += 1;
        SchemaLoadTicket(self.schema_epoch)
    }

    /// Apply an introspection outcome unless the ticket went stale. Returns whether it
    /// was applied.
    pub fn finish_schema_load(
        &mut self,
        ticket: SchemaLoadTicket,
        outcome: IntrospectionOutcome,
    ) -> bool {
        if ticket.0 != self.schema_epoch {
            debug!("schema supplied during load; discarding introspection result");
            return false;
        }
        match outcome {
            IntrospectionOutcome::Loaded(schema) => {
                self.facts.set_schema(SchemaState::loaded(schema));
            }
            IntrospectionOutcome::Absent { response } => {
                self.facts.set_schema(SchemaState::Absent);
                self.coordinator.present_response(response);
            }
        }
        true
    }

    /// Introspect the endpoint and install the result.
    pub async fn load_schema(&mut self) -> bool {
        let ticket = self.begin_schema_load();
        let fetcher = Arc::clone(self.coordinator.fetcher());
        let outcome = introspect(fetcher.as_ref()).await;
        self.finish_schema_load(ticket, outcome)
    }

    /// Run the current document. Must be called inside a tokio runtime.
    pub fn run(&mut self) -> Result<RunHandle, ExecutionError> {
        self.run_selected(None)
    }

    fn run_selected(&mut self, selected: Option<String>) -> Result<RunHandle, ExecutionError> {
        self.from_snapshot = false;
        let request = RunRequest {
            document: self.document(),
            selected_operation: selected,
            headers: self.session.headers().cloned(),
        };
        let handle = self.coordinator.run(request)?;
        if handle.operation_name() != self.facts.operation_name() {
            self.facts
                .adopt_operation_name(handle.operation_name().map(str::to_string));
        }
        Ok(handle)
    }

    /// Run the operation under the cursor. While a stream is active this stops it
    /// instead and returns `None`.
    pub fn run_at_cursor(
        &mut self,
        position: SourcePosition,
    ) -> Result<Option<RunHandle>, ExecutionError> {
        if self.coordinator.is_streaming() {
            self.stop();
            return Ok(None);
        }
        let selected = self
            .facts
            .facts()
            .and_then(|facts| operation_at(facts, position))
            .and_then(|op| op.name.clone());
        self.run_selected(selected).map(Some)
    }

    pub fn stop(&mut self) {
        self.coordinator.stop();
    }

    pub fn activate_mobile(&mut self, headers: HeaderOverrides) {
        self.session.activate(headers);
    }

    /// Leave mobile identity. After a snapshot restore the captured cookies belong to
    /// someone else's session, so the identity is only cleared until the next run.
    pub fn deactivate_mobile(&mut self) -> usize {
        if self.from_snapshot {
            self.session.clear();
            0
        } else {
            self.session.deactivate()
        }
    }

    /// Save the current interaction and return its share URL.
    pub async fn share_snapshot(&self) -> Result<String, SnapshotError> {
        let response = self.coordinator.response();
        let snapshot = Snapshot::capture(
            &self.document(),
            response.as_deref(),
            self.session.identity(),
        )?;
        let id = self.snapshots.save(&snapshot).await?;
        let url = snapshot_url(&self.share_base_url, &id)?;
        info!(snapshot_id = %id, "snapshot shared");
        Ok(url)
    }

    /// Load a stored snapshot and replace the workbench state with it. On failure the
    /// state is left untouched.
    pub async fn restore_snapshot(&mut self, id: &str) -> Result<(), SnapshotError> {
        let payload = self.snapshots.load(id).await?;
        let decoded = decode(&payload)?;
        self.apply_snapshot(decoded);
        info!(snapshot_id = %id, "snapshot restored");
        Ok(())
    }

    pub async fn open_snapshot_url(&mut self, url: &str) -> Result<(), SnapshotError> {
        let id = snapshot_id_from_url(url)
            .ok_or_else(|| SnapshotError::InvalidUrl(format!("no snapshot id in {}", url)))?;
        self.restore_snapshot(&id).await
    }

    /// Install decoded snapshot state.
    pub fn apply_snapshot(&mut self, decoded: DecodedSnapshot) {
        let DecodedSnapshot {
            document,
            response,
            identity,
            from_snapshot,
        } = decoded;
        self.facts.restore(&document.text, document.operation_name);
        self.variables = document.variables;
        self.session.install(identity);
        self.coordinator.restore_response(response);
        self.from_snapshot = from_snapshot;
    }

    /// State to persist; the cookie jar is owned by the caller's store.
    pub fn capture_state(&self) -> WorkbenchState {
        let document = self.document();
        WorkbenchState {
            query: document.text,
            variables: document.variables,
            operation_name: document.operation_name,
            response: self.coordinator.response(),
            identity: self.session.identity().clone(),
            from_snapshot: self.from_snapshot,
            ..WorkbenchState::default()
        }
    }

    /// Reinstate persisted state without running anything.
    pub fn restore_state(&mut self, state: &WorkbenchState) {
        self.facts.restore(&state.query, state.operation_name.clone());
        self.variables = state.variables.clone();
        self.session.install(state.identity.clone());
        self.coordinator.restore_response(state.response.clone());
        self.from_snapshot = state.from_snapshot;
    }
}
