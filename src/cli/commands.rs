//! Command handlers for the `ares-research` binary
//!
//! Graph commands run inside a [`Session`]: the current project is loaded
//! (or an "Untitled" one created), a [`ResearchGraphManager`] resumes from
//! its graph and a [`ProjectPersister`] writes changes back. The session is
//! always closed, even when the command fails, so Failed nodes are kept.

use crate::cli::init::{self, InitConfig, InitResult};
use crate::cli::output::Output;
use crate::cli::{BranchArgs, Cli, Commands, ProjectCommands, ResearchArgs};
use crate::graph::{BranchTarget, NodeId, ReportMode, ResearchGraphManager, RoundOptions};
use crate::llm::{LLMClient, ProviderRegistry};
use crate::project::{FileProjectStore, Project, ProjectPersister, ProjectStore};
use crate::research::ResearchServices;
use crate::types::{AppError, Result, SearchProviderKind, TimeFilter};
use crate::utils::toml_config::ResearchConfig;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const UNTITLED_PROJECT: &str = "Untitled";

/// Run a parsed command line
pub async fn run(cli: Cli, config: &ResearchConfig, output: &Output) -> Result<()> {
    match cli.command {
        Commands::Init {
            path,
            force,
            provider,
        } => run_init(path, force, provider, output),
        Commands::Config { validate } => {
            show_config(&cli.config, config, validate, output);
            Ok(())
        }
        Commands::Project(command) => {
            let store = open_store(config);
            run_project(store.as_ref(), command, output).await
        }
        command => {
            let session = Session::open(config).await?;
            let result = run_graph_command(&session, config, command, output).await;
            session.close().await?;
            result
        }
    }
}

fn open_store(config: &ResearchConfig) -> Arc<dyn ProjectStore> {
    Arc::new(FileProjectStore::new(config.storage.projects_dir.clone()))
}

// ============= Session =============

/// Current project, wired to a graph manager and a debounced persister
pub struct Session {
    manager: ResearchGraphManager,
    persister: ProjectPersister,
}

impl Session {
    pub async fn open(config: &ResearchConfig) -> Result<Self> {
        let store = open_store(config);
        let project = current_or_new_project(store.as_ref()).await?;
        tracing::debug!(id = %project.id, name = %project.name, "Opened project");

        let services = Arc::new(ResearchServices::from_config(config, model_client(config))?);
        Ok(Self::with_services(store, project, services, config))
    }

    pub fn with_services(
        store: Arc<dyn ProjectStore>,
        project: Project,
        services: Arc<ResearchServices>,
        config: &ResearchConfig,
    ) -> Self {
        let manager = ResearchGraphManager::with_state(services, project.graph.clone());
        let persister = ProjectPersister::spawn(
            store,
            project,
            manager.subscribe(),
            Duration::from_millis(config.storage.save_debounce_ms),
        );
        Self { manager, persister }
    }

    pub fn manager(&self) -> &ResearchGraphManager {
        &self.manager
    }

    /// Save the final graph and stop persisting
    pub async fn close(self) -> Result<Project> {
        let Self { manager, persister } = self;
        let project = persister.shutdown().await?;
        drop(manager);
        Ok(project)
    }
}

async fn current_or_new_project(store: &dyn ProjectStore) -> Result<Project> {
    if let Some(id) = store.current_project().await? {
        match store.load_project(&id).await {
            Ok(project) => return Ok(project),
            Err(AppError::NotFound(_)) => {
                tracing::warn!(id = %id, "Current project is gone, starting a new one");
            }
            Err(e) => return Err(e),
        }
    }
    let project = Project::new(UNTITLED_PROJECT);
    store.save_project(&project).await?;
    store.set_current_project(Some(&project.id)).await?;
    Ok(project)
}

/// Model client for the configured platform model. Without one, offline
/// commands still work and model-backed stages fail with the reason.
fn model_client(config: &ResearchConfig) -> Arc<dyn LLMClient> {
    match ProviderRegistry::from_config(config).default_client() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Model Service unavailable: {}", e);
            Arc::new(UnavailableClient {
                reason: e.to_string(),
            })
        }
    }
}

struct UnavailableClient {
    reason: String,
}

#[async_trait]
impl LLMClient for UnavailableClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(AppError::Configuration(self.reason.clone()))
    }

    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(AppError::Configuration(self.reason.clone()))
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

// ============= init / config =============

fn run_init(path: std::path::PathBuf, force: bool, provider: String, output: &Output) -> Result<()> {
    let config = InitConfig {
        path,
        force,
        provider,
    };
    match init::run(config, output) {
        InitResult::Success => Ok(()),
        InitResult::AlreadyExists => Err(AppError::InvalidState(
            "research.toml already exists; use --force to overwrite".to_string(),
        )),
        InitResult::Error(e) => Err(AppError::Internal(e)),
    }
}

fn show_config(path: &Path, config: &ResearchConfig, validate: bool, output: &Output) {
    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv("platform model", &config.research.platform_model);
    output.kv("max sources", &config.research.max_sources.to_string());
    output.kv("min score", &config.research.min_score.to_string());
    output.kv("time filter", config.research.time_filter.as_str());
    output.kv("search provider", &config.research.search_provider.to_string());
    output.kv(
        "retry",
        &format!(
            "{} attempts, {}ms base delay",
            config.retry.max_attempts, config.retry.base_delay_ms
        ),
    );
    output.kv("projects", &config.storage.projects_dir.display().to_string());

    let registry = ProviderRegistry::from_config(config);
    output.subheader("Providers");
    for name in registry.provider_names() {
        output.list_item(name);
    }

    if validate {
        output.newline();
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => output.error(&e.to_string()),
        }
        if let Err(e) = registry.default_client() {
            output.warning(&e.to_string());
        }
    }
}

// ============= project =============

async fn run_project(store: &dyn ProjectStore, command: ProjectCommands, output: &Output) -> Result<()> {
    match command {
        ProjectCommands::New { name, from } => {
            let project = match from {
                Some(template) => Project::from_template(&store.load_project(&template).await?, name),
                None => Project::new(name),
            };
            store.save_project(&project).await?;
            store.set_current_project(Some(&project.id)).await?;
            output.success(&format!("Created project '{}'", project.name));
            output.kv("id", &project.id);
        }
        ProjectCommands::List => {
            let current = store.current_project().await?;
            let projects = store.list_projects().await?;
            if projects.is_empty() {
                output.info("No projects yet");
                output.command("ares-research project new <name>");
                return Ok(());
            }
            output.table_header(&["id", "name", "nodes", "updated"]);
            for summary in projects {
                let marker = if current.as_deref() == Some(summary.id.as_str()) {
                    format!("* {}", summary.name)
                } else {
                    summary.name.clone()
                };
                output.table_row(&[
                    &summary.id,
                    &marker,
                    &summary.node_count.to_string(),
                    &summary.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
        }
        ProjectCommands::Open { id } => {
            let project = store.load_project(&id).await?;
            store.set_current_project(Some(&project.id)).await?;
            output.success(&format!("Opened project '{}'", project.name));
        }
        ProjectCommands::Rename { name } => {
            let mut project = current_or_new_project(store).await?;
            project.rename(name);
            store.save_project(&project).await?;
            output.success(&format!("Renamed project to '{}'", project.name));
        }
        ProjectCommands::Delete { id } => {
            store.delete_project(&id).await?;
            output.success(&format!("Deleted project {}", id));
        }
        ProjectCommands::Export { file } => {
            let json = store.export_all().await?;
            match file {
                Some(path) => {
                    tokio::fs::write(&path, json).await.map_err(|e| {
                        AppError::Persistence(format!("Failed to write {}: {}", path.display(), e))
                    })?;
                    output.created("export", &path.display().to_string());
                }
                None => println!("{}", json),
            }
        }
        ProjectCommands::Import { file } => {
            let text = tokio::fs::read_to_string(&file).await.map_err(|e| {
                AppError::InvalidInput(format!("Failed to read {}: {}", file.display(), e))
            })?;
            if store.import_all(&text).await? {
                output.success("Imported projects");
            } else {
                return Err(AppError::InvalidInput(format!(
                    "{} is not a project export",
                    file.display()
                )));
            }
        }
    }
    Ok(())
}

// ============= graph commands =============

async fn run_graph_command(
    session: &Session,
    config: &ResearchConfig,
    command: Commands,
    output: &Output,
) -> Result<()> {
    let manager = session.manager();
    match command {
        Commands::Research(args) => research(manager, config, args, output).await,
        Commands::Report { selection, picks } => {
            let mode = if picks.is_empty() {
                ReportMode::Automatic
            } else {
                ReportMode::Manual(picks)
            };
            let handle = manager.generate_report(&selection, mode).await?;
            show_nodes(manager, &[handle.report, handle.follow_up], output);
            Ok(())
        }
        Commands::Retry { report } => {
            let retried = manager.retry_report(&report).await?;
            output.success(&format!("Retried {} as {}", report, retried));
            show_nodes(manager, &[retried], output);
            Ok(())
        }
        Commands::Branch(args) => branch(manager, config, args, output).await,
        Commands::Select { report } => {
            if manager.toggle_report_selection(&report)? {
                output.success(&format!("Selected {} for consolidation", report));
            } else {
                output.info(&format!("Deselected {}", report));
            }
            let selected = manager.read(|s| s.selected_reports().to_vec());
            output.kv("selected", &selected.len().to_string());
            Ok(())
        }
        Commands::Consolidate { reports, selected } => {
            let report = if selected {
                manager.consolidate_selected().await?
            } else {
                manager.consolidate(&reports).await?
            };
            output.success("Consolidated report ready");
            show_nodes(manager, &[report], output);
            Ok(())
        }
        Commands::AddUrl { selection, url } => {
            let result = manager.add_custom_url(&selection, &url).await?;
            output.success(&format!("Added {}", result.url));
            output.kv("id", &result.id);
            Ok(())
        }
        Commands::AddDoc { selection, file } => {
            let content = tokio::fs::read_to_string(&file).await.map_err(|e| {
                AppError::InvalidInput(format!("Failed to read {}: {}", file.display(), e))
            })?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let result = manager.add_document(&selection, &name, &content).await?;
            output.success(&format!("Added document '{}'", name));
            output.kv("id", &result.id);
            Ok(())
        }
        Commands::Delete { node } => {
            manager.delete_node(&node)?;
            output.success(&format!("Deleted {} and everything below it", node));
            Ok(())
        }
        Commands::Show { node } => {
            manager.read(|s| match node {
                Some(id) => match s.node(&id) {
                    Some(found) => {
                        output.node_detail(found, s);
                        Ok(())
                    }
                    None => Err(AppError::NotFound(format!("Node '{}' does not exist", id))),
                },
                None => {
                    output.graph_tree(s);
                    Ok(())
                }
            })
        }
        Commands::Init { .. } | Commands::Config { .. } | Commands::Project(_) => Err(
            AppError::Internal("command does not operate on the research graph".to_string()),
        ),
    }
}

/// Round settings from configuration, overridden by command-line flags
pub fn round_options(
    config: &ResearchConfig,
    time_filter: Option<&str>,
    provider: Option<&str>,
    test_mode: bool,
) -> Result<RoundOptions> {
    let mut options = RoundOptions::from_config(&config.research);
    if let Some(filter) = time_filter {
        options.time_filter = filter.parse::<TimeFilter>()?;
    }
    if let Some(provider) = provider {
        options.provider = provider.parse::<SearchProviderKind>()?;
    }
    options.test_mode = test_mode;
    Ok(options)
}

async fn research(
    manager: &ResearchGraphManager,
    config: &ResearchConfig,
    args: ResearchArgs,
    output: &Output,
) -> Result<()> {
    let options = round_options(
        config,
        args.time_filter.as_deref(),
        args.provider.as_deref(),
        args.test,
    )?;

    if args.manual {
        let round = manager
            .start_round(&args.topic, args.parent.as_deref(), options)
            .await?;
        output.success("Search results ready");
        show_nodes(manager, &[round.selection.clone()], output);
        output.hint("Pick sources and generate the report with:");
        output.command(&format!(
            "ares-research report {} --pick <RESULT_ID>",
            round.selection
        ));
        return Ok(());
    }

    let (round, report) = manager
        .run_round(&args.topic, args.parent.as_deref(), options)
        .await?;
    output.success(&format!("Round {} complete", round.group));
    show_nodes(manager, &[report.report, report.follow_up.clone()], output);
    output.hint("Branch from a follow-up term with:");
    output.command("ares-research branch <REPORT_ID> --term 0");
    Ok(())
}

async fn branch(
    manager: &ResearchGraphManager,
    config: &ResearchConfig,
    args: BranchArgs,
    output: &Output,
) -> Result<()> {
    let target = match (args.term, args.query) {
        (Some(index), _) => BranchTarget::Term(index),
        (None, Some(query)) => BranchTarget::Query(query),
        (None, None) => {
            return Err(AppError::InvalidInput(
                "branch needs --term or --query".to_string(),
            ))
        }
    };
    let options = round_options(config, None, None, false)?;
    let round = manager.branch_from_report(&args.report, target, options).await?;
    output.success(&format!("Branched from {}", args.report));

    if args.report_now {
        let handle = manager
            .generate_report(&round.selection, ReportMode::Automatic)
            .await?;
        show_nodes(manager, &[handle.report, handle.follow_up], output);
    } else {
        show_nodes(manager, &[round.selection], output);
    }
    Ok(())
}

fn show_nodes(manager: &ResearchGraphManager, ids: &[NodeId], output: &Output) {
    manager.read(|s| {
        for id in ids {
            if let Some(node) = s.node(id) {
                output.node_detail(node, s);
            }
        }
    });
}
