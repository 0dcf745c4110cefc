//! querylab: GraphQL Query Workbench
//!
//! The core of a GraphQL query IDE: a transport adapter that normalizes single and
//! streaming results, an execution coordinator that suppresses stale results, a
//! schema/query fact cache that keeps the selected operation stable across edits, a
//! snapshot codec for sharing interactions, and browser/mobile session identities.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod execution;
pub mod facts;
pub mod logging;
pub mod schema;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod trace;
pub mod transport;
pub mod workbench;

pub use document::{GraphQLRequest, QueryDocument};
pub use error::ApiError;
pub use execution::{ExecutionCoordinator, RunHandle, RunOutcome, RunRequest};
pub use facts::{FactCache, OperationListener, QueryFacts};
pub use session::{SessionIdentity, SessionState};
pub use transport::{Execution, Fetched, Fetcher};
pub use workbench::Workbench;
