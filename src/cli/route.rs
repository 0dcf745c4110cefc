//! CLI route: single route table and run context. Dispatches to the workbench and
//! presentation.

use crate::cli::help::command_name;
use crate::cli::parse::{Commands, ConfigCommands, MobileCommands, SnapshotCommands};
use crate::cli::presentation::{format_facts, format_identity, format_trace_report};
use crate::config::QueryLabConfig;
use crate::error::{ApiError, SnapshotError};
use crate::execution::RunOutcome;
use crate::facts::{NoopOperationListener, SourcePosition};
use crate::schema::SchemaState;
use crate::session::{parse_header_assignment, MemoryCookieStore};
use crate::snapshot::GraphQLSnapshotBackend;
use crate::storage::WorkbenchStore;
use crate::trace::analyze_response_text;
use crate::transport::HttpFetcher;
use crate::workbench::Workbench;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, loaded config and the state store.
pub struct RunContext {
    workspace_root: PathBuf,
    config: QueryLabConfig,
    store: WorkbenchStore,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = QueryLabConfig::load_validated(&workspace_root, config_path.as_deref())?;
        let store = WorkbenchStore::locate(config.storage.state_dir.as_deref(), &workspace_root);
        debug!(state = %store.path().display(), "run context ready");
        Ok(Self {
            workspace_root,
            config,
            store,
        })
    }

    pub fn config(&self) -> &QueryLabConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &std::path::Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        if let Commands::Config { command } = command {
            return self.configure(command);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        info!(command = %command_name(command), "executing command");
        runtime.block_on(self.execute_async(command))
    }

    fn configure(&self, command: &ConfigCommands) -> Result<String, ApiError> {
        match command {
            ConfigCommands::Show => self.config.to_toml(),
            ConfigCommands::Init { force } => {
                let path = self.config.write_workspace_file(&self.workspace_root, *force)?;
                info!(path = %path.display(), "configuration written");
                Ok(format!("Configuration written to {}", path.display()))
            }
        }
    }

    async fn execute_async(&self, command: &Commands) -> Result<String, ApiError> {
        let state = self.store.load()?;
        let jar = Arc::new(MemoryCookieStore::from_entries(state.cookies.clone()));
        let fetcher = Arc::new(
            HttpFetcher::from_config(&self.config.endpoint)?.with_cookie_store(jar.clone()),
        );
        let backend = Arc::new(GraphQLSnapshotBackend::new(fetcher.clone()));
        let mut workbench = Workbench::new(
            fetcher,
            jar.clone(),
            backend,
            Arc::new(NoopOperationListener),
        )
        .with_share_base_url(self.config.snapshot.share_base_url.clone())
        .with_cookie_ttl_days(self.config.mobile.cookie_ttl_days);
        workbench.restore_state(&state);

        let result = self.route(&mut workbench, command).await;

        let mut next = workbench.capture_state();
        next.cookies = jar.entries();
        self.store.save(&next)?;
        result
    }

    async fn route(&self, workbench: &mut Workbench, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run {
                query,
                variables,
                operation,
                cursor,
                trace,
            } => {
                apply_edits(workbench, query.as_deref(), variables.as_deref())?;
                workbench.load_schema().await;
                if let Some(name) = operation {
                    workbench.edit_operation_name(Some(name));
                }

                let handle = match cursor {
                    Some(cursor) => {
                        let position = SourcePosition::parse(cursor).ok_or_else(|| {
                            ApiError::QueryParse(format!("invalid cursor '{}', expected LINE:COL", cursor))
                        })?;
                        match workbench.run_at_cursor(position)? {
                            Some(handle) => handle,
                            None => return Ok("Stopped.".to_string()),
                        }
                    }
                    None => workbench.run()?,
                };

                match handle.finished().await {
                    RunOutcome::Failed(text) => Err(ApiError::RunFailed(text)),
                    outcome => {
                        debug!(?outcome, "run finished");
                        let response = workbench.response().unwrap_or_default();
                        if *trace {
                            if let Some(report) = analyze_response_text(&response) {
                                return Ok(format!("{}\n\n{}", response, format_trace_report(&report)));
                            }
                        }
                        Ok(response)
                    }
                }
            }
            Commands::Facts { query, format } => {
                apply_edits(workbench, query.as_deref(), None)?;
                workbench.load_schema().await;
                let facts = workbench.facts().ok_or_else(|| {
                    ApiError::QueryParse("the query document does not parse".to_string())
                })?;
                format_facts(&facts, workbench.operation_name(), format)
            }
            Commands::Introspect { output } => {
                workbench.load_schema().await;
                let schema = match workbench.schema() {
                    SchemaState::Loaded(schema) => Arc::clone(schema),
                    _ => {
                        return Err(ApiError::RunFailed(
                            workbench
                                .response()
                                .unwrap_or_else(|| "introspection failed".to_string()),
                        ))
                    }
                };
                let text = serde_json::to_string_pretty(schema.introspection())
                    .map_err(|e| ApiError::ConfigError(e.to_string()))?;
                match output {
                    Some(path) => {
                        std::fs::write(path, text)?;
                        Ok(format!(
                            "Schema with {} types written to {}",
                            schema.type_count(),
                            path.display()
                        ))
                    }
                    None => Ok(text),
                }
            }
            Commands::Mobile { command } => match command {
                MobileCommands::Activate { headers } => {
                    let mut overrides = self.config.mobile.default_headers.clone();
                    for assignment in headers {
                        let (name, value) = parse_header_assignment(assignment)?;
                        overrides.insert(name, value);
                    }
                    let count = overrides.len();
                    workbench.activate_mobile(overrides);
                    Ok(format!("Mobile identity active with {} header override(s).", count))
                }
                MobileCommands::Deactivate => {
                    let restored = workbench.deactivate_mobile();
                    Ok(format!(
                        "Browser identity active; {} cookie(s) reissued.",
                        restored
                    ))
                }
                MobileCommands::Status { format } => format_identity(workbench.identity(), format),
            },
            Commands::Snapshot { command } => match command {
                SnapshotCommands::Share { query, variables } => {
                    apply_edits(workbench, query.as_deref(), variables.as_deref())?;
                    Ok(workbench.share_snapshot().await?)
                }
                SnapshotCommands::Open { target } => {
                    if target.contains("://") {
                        workbench.open_snapshot_url(target).await?;
                    } else if target.trim().is_empty() {
                        return Err(SnapshotError::InvalidUrl(target.clone()).into());
                    } else {
                        workbench.restore_snapshot(target.trim()).await?;
                    }
                    let document = workbench.document();
                    let mut out = document.text;
                    if let Some(variables) = document.variables {
                        out.push_str(&format!("\n\nVariables:\n{}", variables));
                    }
                    if let Some(response) = workbench.response() {
                        out.push_str(&format!("\n\nResponse:\n{}", response));
                    }
                    Ok(out)
                }
            },
            Commands::Config { command } => self.configure(command),
        }
    }
}

fn read_source(source: &str) -> Result<String, ApiError> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

fn apply_edits(
    workbench: &mut Workbench,
    query: Option<&str>,
    variables: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(query) = query {
        let text = read_source(query)?;
        workbench.edit_query(&text);
    }
    if let Some(variables) = variables {
        let text = match variables.strip_prefix('@') {
            Some(path) => read_source(path)?,
            None => variables.to_string(),
        };
        workbench.edit_variables(Some(text));
    }
    Ok(())
}
