//! Query documents and the requests built from them.

use crate::error::ExecutionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The editor's query, raw variables text and selected operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDocument {
    pub text: String,
    /// Raw JSON text exactly as typed.
    pub variables: Option<String>,
    pub operation_name: Option<String>,
}

impl QueryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            variables: None,
            operation_name: None,
        }
    }

    pub fn with_variables(mut self, variables: impl Into<String>) -> Self {
        self.variables = Some(variables.into());
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Whether the text could plausibly be a query. Used as the snapshot gate.
    pub fn looks_like_query(&self) -> bool {
        self.text.contains('{')
    }

    /// Build the outbound request, validating the variables text.
    pub fn to_request(&self) -> Result<GraphQLRequest, ExecutionError> {
        Ok(GraphQLRequest {
            query: self.text.clone(),
            variables: parse_variables(self.variables.as_deref())?,
            operation_name: self.operation_name.clone(),
        })
    }
}

/// Wire request handed to a fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    pub variables: Option<Map<String, Value>>,
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    /// A bare query with no variables or operation name.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: text.into(),
            variables: None,
            operation_name: None,
        }
    }
}

/// Parse raw variables text. Empty or whitespace-only text yields `None`.
pub fn parse_variables(raw: Option<&str>) -> Result<Option<Map<String, Value>>, ExecutionError> {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ExecutionError::InvalidVariables(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(Some(map)),
        // `null` parses but is treated the same as no variables
        Value::Null => Ok(None),
        _ => Err(ExecutionError::VariablesNotObject),
    }
}
