//! Response trace diagnostics.
//!
//! Instrumented endpoints attach a `_gtrace` block to responses:
//!
//! ```text
//! "_gtrace": {
//!   "perfData": { "<service>": { "<metric>": { "counts": 3 }, ... }, ... },
//!   "zipKin":   { "traceId": "..." },
//!   "Q_LB":     { "<query path>": ["<resolver>-<suffix>", ..., { "servicesDeclared": 2 }] }
//! }
//! ```

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Metrics summed across services; a metric matches when its name contains the key.
pub const TRACKED_METRICS: [&str; 2] = ["sql_reads_slave", "redis_reads_"];

/// Diagnostics extracted from one response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceReport {
    pub counters: BTreeMap<String, u64>,
    pub trace_id: Option<String>,
    /// Resolvers called more than once for the same query path
    pub unbatched_resolvers: Vec<String>,
    pub services_declared: u64,
}

impl TraceReport {
    /// Whether the un-batched resolvers are worth reporting: either a single service is
    /// declared, or there are more resolvers than declared services.
    pub fn has_batching_warning(&self) -> bool {
        let found = self.unbatched_resolvers.len() as u64;
        found > 0 && (self.services_declared <= 1 || found > self.services_declared)
    }

    pub fn counter(&self, metric: &str) -> u64 {
        self.counters.get(metric).copied().unwrap_or(0)
    }
}

/// Analyze a response. `None` when the response carries no trace block.
pub fn analyze_trace(response: &Value) -> Option<TraceReport> {
    let trace = response.get("_gtrace")?;

    let mut report = TraceReport {
        counters: TRACKED_METRICS.iter().map(|m| (m.to_string(), 0)).collect(),
        trace_id: trace
            .pointer("/zipKin/traceId")
            .and_then(Value::as_str)
            .map(str::to_string),
        unbatched_resolvers: Vec::new(),
        services_declared: 1,
    };

    if let Some(per_service) = trace.get("perfData").and_then(Value::as_object) {
        for metrics in per_service.values().filter_map(Value::as_object) {
            for (metric_name, data) in metrics {
                let counts = data.get("counts").and_then(Value::as_u64).unwrap_or(0);
                for tracked in TRACKED_METRICS {
                    if metric_name.contains(tracked) {
                        *report.counters.entry(tracked.to_string()).or_insert(0) += counts;
                    }
                }
            }
        }
    }

    let mut resolvers = BTreeSet::new();
    if let Some(paths) = trace.get("Q_LB").and_then(Value::as_object) {
        for calls in paths.values().filter_map(Value::as_array) {
            if calls.len() < 2 {
                continue;
            }
            for call in calls {
                match call {
                    Value::String(name) => {
                        let base = name.split('-').next().unwrap_or(name);
                        resolvers.insert(base.to_string());
                    }
                    other => {
                        if let Some(declared) =
                            other.get("servicesDeclared").and_then(Value::as_u64)
                        {
                            report.services_declared = declared;
                        }
                    }
                }
            }
        }
    }
    report.unbatched_resolvers = resolvers.into_iter().collect();

    Some(report)
}

/// Parse a response text and analyze it.
pub fn analyze_response_text(text: &str) -> Option<TraceReport> {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| analyze_trace(&value))
}
