//! Property-based tests for the workbench invariants

mod reconciliation;
mod round_trips;
mod stale_results;
