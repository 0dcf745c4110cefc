//! Workbench state persistence.
//!
//! The CLI is a sequence of short-lived processes, so the editor state, the session
//! identity and the cookie jar are kept in a JSON file between invocations.

use crate::document::QueryDocument;
use crate::error::SessionError;
use crate::session::{SessionIdentity, StoredCookie};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const STATE_FILE: &str = "workbench.json";
const STATE_VERSION: u32 = 1;

/// Everything persisted between invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbenchState {
    pub version: u32,
    pub query: String,
    pub variables: Option<String>,
    pub operation_name: Option<String>,
    pub response: Option<String>,
    #[serde(default)]
    pub identity: SessionIdentity,
    #[serde(default)]
    pub cookies: BTreeMap<String, StoredCookie>,
    /// State came from a snapshot and no explicit run has happened since
    #[serde(default)]
    pub from_snapshot: bool,
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for WorkbenchState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            query: String::new(),
            variables: None,
            operation_name: None,
            response: None,
            identity: SessionIdentity::Browser,
            cookies: BTreeMap::new(),
            from_snapshot: false,
            saved_at: None,
        }
    }
}

impl WorkbenchState {
    pub fn document(&self) -> QueryDocument {
        QueryDocument {
            text: self.query.clone(),
            variables: self.variables.clone(),
            operation_name: self.operation_name.clone(),
        }
    }
}

/// JSON file store for [`WorkbenchState`]
#[derive(Debug, Clone)]
pub struct WorkbenchStore {
    path: PathBuf,
}

impl WorkbenchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in `state_dir` when given, otherwise in the XDG data directory
    /// (`$XDG_DATA_HOME/querylab`), falling back to `.querylab` under the workspace.
    pub fn locate(state_dir: Option<&Path>, workspace_root: &Path) -> Self {
        let dir = match state_dir {
            Some(dir) => dir.to_path_buf(),
            None => directories::ProjectDirs::from("", "", "querylab")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| workspace_root.join(".querylab")),
        };
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state; a missing file yields the default state.
    pub fn load(&self) -> Result<WorkbenchState, SessionError> {
        if !self.path.exists() {
            return Ok(WorkbenchState::default());
        }
        let bytes = fs::read(&self.path)?;
        let state: WorkbenchState = serde_json::from_slice(&bytes).map_err(|e| {
            SessionError::Corrupt(format!("{}: {}", self.path.display(), e))
        })?;
        if state.version != STATE_VERSION {
            return Err(SessionError::Corrupt(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        debug!(path = %self.path.display(), "workbench state loaded");
        Ok(state)
    }

    /// Save atomically via a temporary file and rename.
    pub fn save(&self, state: &WorkbenchState) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut state = state.clone();
        state.version = STATE_VERSION;
        state.saved_at = Some(Utc::now());

        let bytes = serde_json::to_vec_pretty(&state)
            .map_err(|e| SessionError::Corrupt(e.to_string()))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;
        debug!(path = %self.path.display(), "workbench state saved");
        Ok(())
    }
}
