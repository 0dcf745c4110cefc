//! Integration tests for the querylab workbench core

mod schema_loading;
mod session_persistence;
mod snapshot_flow;
