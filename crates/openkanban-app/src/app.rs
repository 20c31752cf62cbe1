use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use openkanban_agent::StatusDetector;
use openkanban_config::Config;
use openkanban_core::{
    AgentStatus, Board, Project, ProjectId, ProjectRegistry, Ticket, TicketStore,
};
use openkanban_ui::{init_commands, update, view, Event, Model};

use crate::executor::CommandExecutor;
use crate::terminal::{spawn_input_thread, TerminalGuard};

const EVENT_QUEUE_CAPACITY: usize = 1_024;
const PROJECTS_FILE: &str = "projects.json";
const LOG_FILE: &str = "openkanban.log";

pub fn init_tracing(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data directory '{}'", data_dir.display()))?;
    let log_file = fs::File::create(data_dir.join(LOG_FILE))
        .with_context(|| format!("open log file in '{}'", data_dir.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

pub async fn run(config: Config, data_dir: PathBuf) -> Result<()> {
    let projects_path = data_dir.join(PROJECTS_FILE);
    let registry = load_registry(&projects_path)?;
    let store = TicketStore::new(&data_dir);
    let board = load_board(&store, &registry)?;
    info!(
        projects = registry.projects().len(),
        tickets = board.len(),
        "starting openkanban"
    );

    let (event_tx, mut event_rx) = mpsc::channel::<Event>(EVENT_QUEUE_CAPACITY);
    let executor = CommandExecutor::new(
        event_tx.clone(),
        Arc::new(StatusDetector::new()),
        store,
        projects_path,
    );

    let mut model = Model::new(Arc::new(config), board, registry);
    for command in init_commands(&model.config) {
        executor.spawn(command);
    }
    spawn_input_thread(event_tx);

    let mut guard = TerminalGuard::init()?;
    let size = guard.terminal.size()?;
    model.width = size.width;
    model.height = size.height;

    loop {
        guard.terminal.draw(|frame| view(&model, frame))?;
        let Some(event) = event_rx.recv().await else {
            break;
        };
        for command in update(&mut model, event) {
            executor.spawn(command);
        }
        if model.should_quit {
            break;
        }
    }

    drop(guard);
    info!("openkanban exited");
    Ok(())
}

/// Loads the registry, registering the current directory as a project when
/// nothing is configured yet.
fn load_registry(projects_path: &Path) -> Result<ProjectRegistry> {
    let mut registry = ProjectRegistry::load(projects_path)?;
    if registry.is_empty() {
        let cwd = std::env::current_dir().context("resolve current directory")?;
        let name = cwd
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "default".to_owned());
        registry.add(Project {
            id: ProjectId::generate(),
            name,
            repo_path: cwd,
        });
        registry.save(projects_path)?;
    }
    Ok(registry)
}

fn load_board(store: &TicketStore, registry: &ProjectRegistry) -> Result<Board> {
    let mut tickets = Vec::new();
    for project in registry.projects() {
        tickets.extend(store.load(&project.id)?);
    }
    Ok(Board::with_tickets(reset_stale_sessions(tickets)))
}

/// Panes do not survive a restart; any persisted session binding is stale
/// by definition when the application starts.
fn reset_stale_sessions(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
    for ticket in &mut tickets {
        if ticket.session_id.is_some() || ticket.agent_status != AgentStatus::None {
            ticket.session_id = None;
            ticket.agent_status = AgentStatus::None;
        }
    }
    tickets
}
