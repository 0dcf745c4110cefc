//! Schema/Query Fact Cache
//!
//! Facts are derived from `(schema, query text)`: the document's operations with their
//! source ranges and the declared type of every variable. They are recomputed whenever
//! the schema identity, the query text or the operation name changes, and always replaced
//! wholesale. Each recompute also reconciles which operation is selected.

use crate::schema::SchemaState;
use graphql_parser::query::{Definition, OperationDefinition, Type, VariableDefinition};
use graphql_parser::Pos;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Receives operation-name changes made on the user's behalf.
pub trait OperationListener: Send + Sync {
    fn on_edit_operation_name(&self, name: Option<&str>);
}

/// Listener that ignores notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationListener;

impl OperationListener for NoopOperationListener {
    fn on_edit_operation_name(&self, _name: Option<&str>) {}
}

/// 1-based line/column position in the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Parse `LINE:COL`.
    pub fn parse(text: &str) -> Option<Self> {
        let (line, column) = text.split_once(':')?;
        Some(Self::new(line.trim().parse().ok()?, column.trim().parse().ok()?))
    }
}

impl From<Pos> for SourcePosition {
    fn from(pos: Pos) -> Self {
        Self::new(pos.line, pos.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceRange {
    pub fn contains(&self, position: SourcePosition) -> bool {
        self.start <= position && position <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// One executable operation in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFact {
    pub name: Option<String>,
    pub kind: OperationKind,
    pub range: SourceRange,
}

/// Facts derived from a schema and a query document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryFacts {
    pub operations: Vec<OperationFact>,
    /// Variable name (without `$`) to its declared type, e.g. `[ID!]!`
    pub variable_to_type: BTreeMap<String, String>,
}

fn render_type<'a>(ty: &Type<'a, &'a str>) -> String {
    match ty {
        Type::NamedType(name) => name.to_string(),
        Type::ListType(inner) => format!("[{}]", render_type(inner)),
        Type::NonNullType(inner) => format!("{}!", render_type(inner)),
    }
}

fn named_type<'a>(ty: &Type<'a, &'a str>) -> &'a str {
    match ty {
        Type::NamedType(name) => *name,
        Type::ListType(inner) | Type::NonNullType(inner) => named_type(inner),
    }
}

/// Compute facts. `None` when the schema has not been loaded yet or the text does not
/// parse; an `Absent` schema still yields operations, with no variable types.
pub fn compute_facts(schema: &SchemaState, query_text: &str) -> Option<QueryFacts> {
    if schema.is_not_loaded() || query_text.trim().is_empty() {
        return None;
    }

    let document = match graphql_parser::parse_query::<&str>(query_text) {
        Ok(document) => document,
        Err(e) => {
            debug!(error = %e, "query text does not parse");
            return None;
        }
    };

    let no_variables: &[VariableDefinition<'_, &str>] = &[];
    let mut facts = QueryFacts::default();
    for definition in &document.definitions {
        let operation = match definition {
            Definition::Operation(operation) => operation,
            Definition::Fragment(_) => continue,
        };

        let (name, kind, start, end, variables) = match operation {
            OperationDefinition::SelectionSet(set) => {
                (None, OperationKind::Query, set.span.0, set.span.1, no_variables)
            }
            OperationDefinition::Query(q) => (
                q.name,
                OperationKind::Query,
                q.position,
                q.selection_set.span.1,
                q.variable_definitions.as_slice(),
            ),
            OperationDefinition::Mutation(m) => (
                m.name,
                OperationKind::Mutation,
                m.position,
                m.selection_set.span.1,
                m.variable_definitions.as_slice(),
            ),
            OperationDefinition::Subscription(s) => (
                s.name,
                OperationKind::Subscription,
                s.position,
                s.selection_set.span.1,
                s.variable_definitions.as_slice(),
            ),
        };

        facts.operations.push(OperationFact {
            name: name.map(str::to_string),
            kind,
            range: SourceRange {
                start: start.into(),
                end: end.into(),
            },
        });

        if let Some(schema) = schema.schema() {
            for variable in variables {
                if schema.has_type(named_type(&variable.var_type)) {
                    facts
                        .variable_to_type
                        .insert(variable.name.to_string(), render_type(&variable.var_type));
                }
            }
        }
    }

    Some(facts)
}

/// Choose the operation to run after the document's operations changed.
///
/// A literal match on `desired` wins. Otherwise a lone operation (or the one anonymous
/// operation) is selected, then the operation now at the index `desired` used to occupy,
/// and finally the first operation.
pub fn select_operation_name(
    previous: Option<&[OperationFact]>,
    desired: Option<&str>,
    operations: &[OperationFact],
) -> Option<String> {
    let first = operations.first()?;

    if let Some(desired) = desired {
        if operations.iter().any(|op| op.name.as_deref() == Some(desired)) {
            return Some(desired.to_string());
        }
    }

    if operations.len() == 1 {
        return first.name.clone();
    }
    let mut anonymous = operations.iter().filter(|op| op.name.is_none());
    if let (Some(only), None) = (anonymous.next(), anonymous.next()) {
        return only.name.clone();
    }

    if let (Some(desired), Some(previous)) = (desired, previous) {
        let index = previous
            .iter()
            .position(|op| op.name.as_deref() == Some(desired));
        if let Some(op) = index.and_then(|i| operations.get(i)) {
            return op.name.clone();
        }
    }

    first.name.clone()
}

/// The operation whose source range contains `position`.
pub fn operation_at(facts: &QueryFacts, position: SourcePosition) -> Option<&OperationFact> {
    facts
        .operations
        .iter()
        .find(|op| op.range.contains(position))
}

/// Holds the current facts and the reconciled operation name.
pub struct FactCache {
    schema: SchemaState,
    query: String,
    operation_name: Option<String>,
    facts: Option<Arc<QueryFacts>>,
    listener: Arc<dyn OperationListener>,
}

impl FactCache {
    pub fn new(listener: Arc<dyn OperationListener>) -> Self {
        Self {
            schema: SchemaState::NotLoaded,
            query: String::new(),
            operation_name: None,
            facts: None,
            listener,
        }
    }

    pub fn schema(&self) -> &SchemaState {
        &self.schema
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn facts(&self) -> Option<&Arc<QueryFacts>> {
        self.facts.as_ref()
    }

    pub fn set_query(&mut self, query: &str) {
        if self.query != query {
            self.query = query.to_string();
            self.recompute();
        }
    }

    pub fn set_schema(&mut self, schema: SchemaState) {
        if !self.schema.same_identity(&schema) {
            self.schema = schema;
            self.recompute();
        }
    }

    pub fn set_operation_name(&mut self, name: Option<&str>) {
        if self.operation_name.as_deref() != name {
            self.operation_name = name.map(str::to_string);
            self.recompute();
        }
    }

    /// Adopt a name chosen outside reconciliation (an explicit run selection).
    pub fn adopt_operation_name(&mut self, name: Option<String>) {
        self.operation_name = name;
    }

    /// Replace the text and reconcile even when it is unchanged. A `None` name keeps the
    /// current selection as the preferred one.
    pub fn restore(&mut self, query: &str, operation_name: Option<String>) {
        if operation_name.is_some() {
            self.operation_name = operation_name;
        }
        self.query = query.to_string();
        self.recompute();
    }

    /// Recompute facts and reconcile the operation name, notifying at most once. When the
    /// text no longer parses the previous facts and selection stay in place.
    fn recompute(&mut self) {
        let facts = match compute_facts(&self.schema, &self.query) {
            Some(facts) => Arc::new(facts),
            None => return,
        };

        let previous = self.facts.as_ref().map(|f| f.operations.as_slice());
        let selected = select_operation_name(
            previous,
            self.operation_name.as_deref(),
            &facts.operations,
        );

        if selected != self.operation_name {
            debug!(
                from = ?self.operation_name,
                to = ?selected,
                "operation selection changed"
            );
            self.listener.on_edit_operation_name(selected.as_deref());
            self.operation_name = selected;
        }
        self.facts = Some(facts);
    }
}
