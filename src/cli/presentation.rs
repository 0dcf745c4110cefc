//! CLI presentation: text and json formatters per command family.

use crate::error::ApiError;
use crate::facts::{OperationKind, QueryFacts};
use crate::session::{SessionIdentity, MOBILE_COOKIE_HEADER};
use crate::trace::TraceReport;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

fn to_json(value: &serde_json::Value) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| ApiError::ConfigError(e.to_string()))
}

fn kind_label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Query => "query",
        OperationKind::Mutation => "mutation",
        OperationKind::Subscription => "subscription",
    }
}

pub fn format_facts(
    facts: &QueryFacts,
    selected: Option<&str>,
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&json!({
            "selected_operation": selected,
            "operations": facts.operations,
            "variables": facts.variable_to_type,
        }));
    }

    let mut operations = Table::new();
    operations.load_preset(UTF8_BORDERS_ONLY);
    operations.set_header(vec!["", "Operation", "Kind", "Lines"]);
    for op in &facts.operations {
        let marker = if op.name.is_some() && op.name.as_deref() == selected {
            "*"
        } else {
            ""
        };
        operations.add_row(vec![
            marker.to_string(),
            op.name.clone().unwrap_or_else(|| "(anonymous)".to_string()),
            kind_label(op.kind).to_string(),
            format!("{}-{}", op.range.start.line, op.range.end.line),
        ]);
    }

    let mut out = operations.to_string();
    if !facts.variable_to_type.is_empty() {
        let mut variables = Table::new();
        variables.load_preset(UTF8_BORDERS_ONLY);
        variables.set_header(vec!["Variable", "Type"]);
        for (name, ty) in &facts.variable_to_type {
            variables.add_row(vec![format!("${}", name), ty.clone()]);
        }
        out.push('\n');
        out.push_str(&variables.to_string());
    }
    Ok(out)
}

pub fn format_identity(identity: &SessionIdentity, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        let value = serde_json::to_value(identity).map_err(|e| ApiError::ConfigError(e.to_string()))?;
        return to_json(&value);
    }

    match identity {
        SessionIdentity::Browser => Ok(format!("Identity: {}", "browser".green())),
        SessionIdentity::Mobile {
            headers,
            cookie_snapshot,
        } => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Header", "Value"]);
            for (name, value) in headers {
                let shown = if name.eq_ignore_ascii_case(MOBILE_COOKIE_HEADER) {
                    format!("({} bytes)", value.len())
                } else {
                    value.clone()
                };
                table.add_row(vec![name.clone(), shown]);
            }
            let captured = if cookie_snapshot.is_some() {
                "browser cookies captured"
            } else {
                "no browser cookies captured"
            };
            Ok(format!(
                "Identity: {} ({})\n{}",
                "mobile".yellow(),
                captured,
                table
            ))
        }
    }
}

pub fn format_trace_report(report: &TraceReport) -> String {
    let mut out = format!(
        "SQL: {} - REDIS: {}",
        report.counter("sql_reads_slave"),
        report.counter("redis_reads_")
    );
    if let Some(trace_id) = &report.trace_id {
        out.push_str(&format!("\nTrace: {}", trace_id));
    }
    if report.has_batching_warning() {
        out.push_str(&format!(
            "\n{} {}",
            "Un-batched resolvers:".red(),
            report.unbatched_resolvers.join(", ")
        ));
    }
    out
}
