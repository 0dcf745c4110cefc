//! Schema state and introspection loading.
//!
//! Full client-schema construction is out of scope; a loaded [`Schema`] indexes the named
//! types reported by introspection so that variable types can be resolved against it.

use crate::document::GraphQLRequest;
use crate::error::TransportError;
use crate::transport::{fetch_one, Fetcher};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Standard introspection query
pub const INTROSPECTION_QUERY: &str = r#"
  query IntrospectionQuery {
    __schema {
      queryType { name }
      mutationType { name }
      subscriptionType { name }
      types { ...FullType }
      directives { name description locations args { ...InputValue } }
    }
  }
  fragment FullType on __Type {
    kind name description
    fields(includeDeprecated: true) {
      name description
      args { ...InputValue }
      type { ...TypeRef }
      isDeprecated deprecationReason
    }
    inputFields { ...InputValue }
    interfaces { ...TypeRef }
    enumValues(includeDeprecated: true) { name description isDeprecated deprecationReason }
    possibleTypes { ...TypeRef }
  }
  fragment InputValue on __InputValue { name description type { ...TypeRef } defaultValue }
  fragment TypeRef on __Type {
    kind name
    ofType { kind name ofType { kind name ofType { kind name ofType { kind name
      ofType { kind name ofType { kind name ofType { kind name } } } } } } }
  }
"#;

/// Fallback for services without subscription support in their introspection schema
pub const INTROSPECTION_QUERY_SANS_SUBSCRIPTIONS: &str = r#"
  query IntrospectionQuery {
    __schema {
      queryType { name }
      mutationType { name }
      types { ...FullType }
      directives { name description locations args { ...InputValue } }
    }
  }
  fragment FullType on __Type {
    kind name description
    fields(includeDeprecated: true) {
      name description
      args { ...InputValue }
      type { ...TypeRef }
      isDeprecated deprecationReason
    }
    inputFields { ...InputValue }
    interfaces { ...TypeRef }
    enumValues(includeDeprecated: true) { name description isDeprecated deprecationReason }
    possibleTypes { ...TypeRef }
  }
  fragment InputValue on __InputValue { name description type { ...TypeRef } defaultValue }
  fragment TypeRef on __Type {
    kind name
    ofType { kind name ofType { kind name ofType { kind name ofType { kind name
      ofType { kind name ofType { kind name ofType { kind name } } } } } } }
  }
"#;

/// Built-in scalars every schema knows
const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

fn next_schema_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Introspected schema
#[derive(Debug, Clone)]
pub struct Schema {
    id: u64,
    type_names: BTreeSet<String>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    introspection: Value,
}

impl Schema {
    /// Build from the `data` member of an introspection result.
    pub fn from_introspection(data: Value) -> Result<Self, TransportError> {
        let schema = data.get("__schema").ok_or_else(|| {
            TransportError::InvalidResponse("introspection result has no __schema".to_string())
        })?;

        let mut type_names: BTreeSet<String> = schema
            .get("types")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        type_names.extend(BUILTIN_SCALARS.iter().map(|s| s.to_string()));

        let root = |key: &str| {
            schema
                .get(key)
                .and_then(|t| t.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(Self {
            id: next_schema_id(),
            query_type: root("queryType"),
            mutation_type: root("mutationType"),
            subscription_type: root("subscriptionType"),
            type_names,
            introspection: data,
        })
    }

    /// Schema that knows only the given named types.
    pub fn with_types<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut type_names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        type_names.extend(BUILTIN_SCALARS.iter().map(|s| s.to_string()));
        Self {
            id: next_schema_id(),
            type_names,
            query_type: Some("Query".to_string()),
            mutation_type: None,
            subscription_type: None,
            introspection: Value::Null,
        }
    }

    /// Identity used to detect schema replacement.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.type_names.contains(name)
    }

    pub fn type_count(&self) -> usize {
        self.type_names.len()
    }

    pub fn query_type(&self) -> Option<&str> {
        self.query_type.as_deref()
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }

    /// Raw introspection data.
    pub fn introspection(&self) -> &Value {
        &self.introspection
    }
}

/// Schema availability. `Absent` means "known to have no schema" and is distinct from
/// `NotLoaded`.
#[derive(Debug, Clone, Default)]
pub enum SchemaState {
    #[default]
    NotLoaded,
    Absent,
    Loaded(Arc<Schema>),
}

impl SchemaState {
    pub fn loaded(schema: Schema) -> Self {
        SchemaState::Loaded(Arc::new(schema))
    }

    pub fn schema(&self) -> Option<&Schema> {
        match self {
            SchemaState::Loaded(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_not_loaded(&self) -> bool {
        matches!(self, SchemaState::NotLoaded)
    }

    /// Whether two states denote the same schema.
    pub fn same_identity(&self, other: &SchemaState) -> bool {
        match (self, other) {
            (SchemaState::NotLoaded, SchemaState::NotLoaded) => true,
            (SchemaState::Absent, SchemaState::Absent) => true,
            (SchemaState::Loaded(a), SchemaState::Loaded(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

/// Result of an introspection attempt
#[derive(Debug)]
pub enum IntrospectionOutcome {
    Loaded(Schema),
    /// No schema; carries the text to show in place of a response
    Absent { response: String },
}

/// Fetch and index the endpoint's schema.
pub async fn introspect(fetcher: &dyn Fetcher) -> IntrospectionOutcome {
    match try_introspect(fetcher).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "introspection failed");
            IntrospectionOutcome::Absent {
                response: e.to_string(),
            }
        }
    }
}

async fn try_introspect(fetcher: &dyn Fetcher) -> Result<IntrospectionOutcome, TransportError> {
    let first = fetch_one(fetcher, GraphQLRequest::query(INTROSPECTION_QUERY)).await?;
    let result = if has_data(&first) {
        first
    } else {
        info!("introspection returned no data; retrying without subscriptions");
        fetch_one(
            fetcher,
            GraphQLRequest::query(INTROSPECTION_QUERY_SANS_SUBSCRIPTIONS),
        )
        .await?
    };

    if !has_data(&result) {
        let response = match &result {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        return Ok(IntrospectionOutcome::Absent { response });
    }

    let data = result.get("data").cloned().unwrap_or(Value::Null);
    let schema = Schema::from_introspection(data)?;
    info!(types = schema.type_count(), "schema loaded");
    Ok(IntrospectionOutcome::Loaded(schema))
}

fn has_data(result: &Value) -> bool {
    result.get("data").map_or(false, |data| !data.is_null())
}
