use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

use openkanban_agent::{build_agent_command, SpawnContext};
use openkanban_config::Config;
use openkanban_core::{AgentStatus, Project, ProjectId, SessionId, Ticket, TicketId, TicketStatus};
use openkanban_runtime::{encode_key, sanitized_environment, PaneEvent};

use crate::model::ProjectForm;
use crate::{
    Command, ConfirmAction, Event, FormField, Mode, Model, SpawnState, StatusInput, TicketForm,
    TickKind, ANIMATION_FRAMES, ANIMATION_INTERVAL, NOTIFICATION_TTL,
};

/// Commands the application schedules before the first event arrives.
pub fn init_commands(config: &Config) -> Vec<Command> {
    vec![
        Command::Tick {
            kind: TickKind::StatusPoll,
            delay: Duration::from_secs(config.poll_interval_secs()),
        },
        Command::Tick {
            kind: TickKind::Animation,
            delay: ANIMATION_INTERVAL,
        },
    ]
}

/// Applies one event to the model. All model mutation happens here, on the
/// update thread; anything blocking is returned as a command.
pub fn update(model: &mut Model, event: Event) -> Vec<Command> {
    let mut commands = Vec::new();
    match event {
        Event::Key(key) => handle_key(model, key, &mut commands),
        Event::Resize(width, height) => {
            model.width = width;
            model.height = height;
            model.ensure_column_visible();
            resize_focused_pane(model);
        }
        Event::Tick(kind) => handle_tick(model, kind, &mut commands),
        Event::Pane(pane_event) => handle_pane_event(model, pane_event, &mut commands),
        Event::WorktreeCreated {
            ticket,
            path,
            branch,
            base_branch,
        } => handle_worktree_created(model, ticket, path, branch, base_branch, &mut commands),
        Event::SpawnComplete { ticket, pane } => {
            handle_spawn_complete(model, ticket, pane, &mut commands)
        }
        Event::SpawnFailed { ticket, error } => {
            if model
                .spawning
                .as_ref()
                .is_some_and(|state| state.ticket == ticket)
            {
                model.spawning = None;
                if model.mode == Mode::Spawning {
                    model.mode = Mode::Normal;
                }
            }
            model.notify(format!("Spawn failed: {error}"), &mut commands);
        }
        Event::StatusesClassified(statuses) => {
            apply_classifications(model, statuses, &mut commands)
        }
        Event::Notification(text) => model.notify(text, &mut commands),
    }
    commands
}

fn handle_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    if model.mode == Mode::ShuttingDown {
        return;
    }

    // Global keys run before any mode handler.
    if key.code == KeyCode::Esc {
        escape_to_normal(model);
        return;
    }
    if model.mode == Mode::Normal {
        let ctrl_c =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key.code == KeyCode::Char('q') {
            request_quit(model, commands);
            return;
        }
        if key.code == KeyCode::Char('?') {
            model.mode = Mode::Help;
            return;
        }
    }

    // An active Help or Confirm overlay consumes all input.
    if model.mode == Mode::Help {
        model.mode = Mode::Normal;
        return;
    }
    if model.mode == Mode::Confirm {
        handle_confirm_key(model, key, commands);
        return;
    }

    match model.mode {
        Mode::Normal => handle_normal_key(model, key, commands),
        Mode::AgentView => handle_agent_view_key(model, key, commands),
        Mode::Filter => handle_filter_key(model, key),
        Mode::Command => handle_command_key(model, key, commands),
        Mode::CreateTicket | Mode::EditTicket => handle_form_key(model, key, commands),
        Mode::Settings => handle_settings_key(model, key),
        Mode::CreateProject => handle_project_form_key(model, key, commands),
        // Spawning ignores everything except the global Escape; Insert is
        // a reserved placeholder with no bindings.
        Mode::Spawning | Mode::Insert => {}
        Mode::Help | Mode::Confirm | Mode::ShuttingDown => {}
    }
}

fn escape_to_normal(model: &mut Model) {
    match model.mode {
        Mode::ShuttingDown => {}
        Mode::Filter => {
            model.filter.clear();
            model.clamp_selection();
            model.mode = Mode::Normal;
        }
        Mode::Spawning => {
            // Aborts the transition; an in-flight worktree command keeps
            // running and its late result is dropped.
            model.spawning = None;
            model.mode = Mode::Normal;
        }
        _ => {
            model.confirm = None;
            model.form = None;
            model.project_form = None;
            model.command_input.clear();
            model.focused_ticket = None;
            model.mode = Mode::Normal;
        }
    }
}

fn handle_normal_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => move_column(model, -1),
        KeyCode::Char('l') | KeyCode::Right => move_column(model, 1),
        KeyCode::Char('j') | KeyCode::Down => move_ticket_cursor(model, 1),
        KeyCode::Char('k') | KeyCode::Up => move_ticket_cursor(model, -1),
        KeyCode::Char('g') => {
            model.active_ticket = 0;
        }
        KeyCode::Char('G') => {
            if let Some(column) = model.board.columns().get(model.active_column) {
                let count = model.visible_tickets(column.status).len();
                model.active_ticket = count.saturating_sub(1);
            }
        }
        KeyCode::Char('n') => open_create_form(model),
        KeyCode::Char('e') => open_edit_form(model, commands),
        KeyCode::Char('d') => confirm_delete(model),
        KeyCode::Char(' ') => move_selected_ticket(model, true, commands),
        KeyCode::Char('-') => move_selected_ticket(model, false, commands),
        KeyCode::Char('s') => spawn_agent(model, commands),
        KeyCode::Char('S') => stop_agent(model, commands),
        KeyCode::Enter => attach_to_agent(model, commands),
        KeyCode::Char('/') => {
            model.mode = Mode::Filter;
        }
        KeyCode::Char(':') => {
            model.command_input.clear();
            model.mode = Mode::Command;
        }
        KeyCode::Char('O') => {
            model.mode = Mode::Settings;
        }
        KeyCode::Char('[') => {
            model.show_sidebar = !model.show_sidebar;
            model.ensure_column_visible();
        }
        KeyCode::Char('P') => {
            model.project_form = Some(ProjectForm::default());
            model.mode = Mode::CreateProject;
        }
        _ => {}
    }
}

fn move_column(model: &mut Model, delta: isize) {
    let columns = model.board.columns().len() as isize;
    if columns == 0 {
        return;
    }
    let next = (model.active_column as isize + delta).clamp(0, columns - 1);
    model.active_column = next as usize;
    model.active_ticket = 0;
    model.ensure_column_visible();
}

fn move_ticket_cursor(model: &mut Model, delta: isize) {
    let Some(column) = model.board.columns().get(model.active_column) else {
        return;
    };
    let count = model.visible_tickets(column.status).len() as isize;
    if count == 0 {
        model.active_ticket = 0;
        return;
    }
    let next = (model.active_ticket as isize + delta).clamp(0, count - 1);
    model.active_ticket = next as usize;
}

fn handle_confirm_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some((_, action)) = model.confirm.take() {
                model.mode = Mode::Normal;
                match action {
                    ConfirmAction::DeleteTicket(id) => delete_ticket(model, id, commands),
                }
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') => {
            model.confirm = None;
            model.mode = Mode::Normal;
        }
        _ => {}
    }
}

fn handle_agent_view_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    let ctrl_g = key.code == KeyCode::Char('g') && key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl_g {
        model.focused_ticket = None;
        model.mode = Mode::Normal;
        return;
    }

    let Some(ticket) = model.focused_ticket.clone() else {
        model.mode = Mode::Normal;
        return;
    };
    let Some(pane) = model.panes.get(&ticket) else {
        model.focused_ticket = None;
        model.mode = Mode::Normal;
        return;
    };
    if let Some(bytes) = encode_key(&key) {
        if let Err(error) = pane.write(&bytes) {
            model.notify(format!("Agent input failed: {error}"), commands);
        }
    }
}

fn handle_filter_key(model: &mut Model, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            model.filter.commit();
            model.clamp_selection();
            model.mode = Mode::Normal;
        }
        KeyCode::Backspace => {
            model.filter.input.pop();
            model.filter.commit();
            model.clamp_selection();
        }
        KeyCode::Char(c) => {
            model.filter.input.push(c);
            model.filter.commit();
            model.clamp_selection();
        }
        _ => {}
    }
}

fn handle_command_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    match key.code {
        KeyCode::Enter => {
            let input = model.command_input.trim().to_owned();
            model.command_input.clear();
            model.mode = Mode::Normal;
            match input.as_str() {
                "" => {}
                "q" | "quit" => request_quit(model, commands),
                "w" | "write" => {
                    save_all_projects(model, commands);
                    model.notify("Saved", commands);
                }
                "help" => {
                    model.mode = Mode::Help;
                }
                other => model.notify(format!("Unknown command: {other}"), commands),
            }
        }
        KeyCode::Backspace => {
            model.command_input.pop();
        }
        KeyCode::Char(c) => {
            model.command_input.push(c);
        }
        _ => {}
    }
}

fn handle_settings_key(model: &mut Model, key: KeyEvent) {
    if key.code == KeyCode::Char('p') {
        model.project_form = Some(ProjectForm::default());
        model.mode = Mode::CreateProject;
    }
}

fn handle_project_form_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    let Some(form) = model.project_form.as_mut() else {
        model.mode = Mode::Normal;
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::BackTab => {
            form.editing_path = !form.editing_path;
        }
        KeyCode::Backspace => {
            if form.editing_path {
                form.repo_path.pop();
            } else {
                form.name.pop();
            }
        }
        KeyCode::Char(c) => {
            if form.editing_path {
                form.repo_path.push(c);
            } else {
                form.name.push(c);
            }
        }
        KeyCode::Enter => submit_project_form(model, commands),
        _ => {}
    }
}

fn submit_project_form(model: &mut Model, commands: &mut Vec<Command>) {
    let Some(form) = model.project_form.take() else {
        return;
    };
    let name = form.name.trim().to_owned();
    let repo_path = form.repo_path.trim().to_owned();
    if name.is_empty() || repo_path.is_empty() {
        model.project_form = Some(form);
        model.notify("Project name and repository path are required", commands);
        return;
    }
    if model.registry.find_by_name(&name).is_some() {
        model.project_form = Some(form);
        model.notify(format!("Project '{name}' already exists"), commands);
        return;
    }

    let project = Project {
        id: ProjectId::generate(),
        name: name.clone(),
        repo_path: repo_path.into(),
    };
    if model.active_project.is_none() {
        model.active_project = Some(project.id.clone());
    }
    model.registry.add(project);
    commands.push(Command::SaveProjects {
        projects: model.registry.projects().to_vec(),
    });
    model.mode = Mode::Normal;
    model.notify(format!("Registered project: {name}"), commands);
}

fn open_create_form(model: &mut Model) {
    let agents: Vec<String> = model.config.agents.keys().cloned().collect();
    model.form = Some(TicketForm::create(agents, &model.config.default_agent));
    model.mode = Mode::CreateTicket;
}

fn open_edit_form(model: &mut Model, commands: &mut Vec<Command>) {
    let ticket = model.selected_ticket().cloned();
    let Some(ticket) = ticket else {
        model.notify("No ticket selected", commands);
        return;
    };
    let agents: Vec<String> = model.config.agents.keys().cloned().collect();
    model.form = Some(TicketForm::edit(&ticket, agents));
    model.mode = Mode::EditTicket;
}

fn handle_form_key(model: &mut Model, key: KeyEvent, commands: &mut Vec<Command>) {
    let Some(form) = model.form.as_mut() else {
        model.mode = Mode::Normal;
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => form.focus_previous(),
        KeyCode::Left => match form.focus {
            FormField::Agent => form.cycle_agent(-1),
            FormField::Priority => form.adjust_priority(-1),
            _ => {}
        },
        KeyCode::Right => match form.focus {
            FormField::Agent => form.cycle_agent(1),
            FormField::Priority => form.adjust_priority(1),
            _ => {}
        },
        KeyCode::Backspace => form.pop_char(),
        KeyCode::Char(c) => form.push_char(c),
        KeyCode::Enter => submit_ticket_form(model, commands),
        _ => {}
    }
}

fn submit_ticket_form(model: &mut Model, commands: &mut Vec<Command>) {
    let Some(form) = model.form.take() else {
        return;
    };
    let title = form.title.trim().to_owned();
    if title.is_empty() {
        model.form = Some(form);
        model.notify("Title cannot be empty", commands);
        return;
    }

    match form.editing.clone() {
        None => {
            let Some(project_id) = model.active_project.clone() else {
                model.form = Some(form);
                model.notify("Register a project first (P)", commands);
                return;
            };
            let status = model
                .board
                .columns()
                .get(model.active_column)
                .map(|column| column.status)
                .unwrap_or(TicketStatus::Backlog);

            let mut ticket = Ticket::new(project_id.clone(), title.clone());
            ticket.status = status;
            ticket.description = form.description.trim().to_owned();
            ticket.priority = form.priority;
            ticket.agent_type = form.selected_agent().unwrap_or_default().to_owned();
            ticket.labels = form.labels_set();
            model.board.add_ticket(ticket);
            model.clamp_selection();
            commands.push(model.save_command(&project_id));
            model.mode = Mode::Normal;
            model.notify(format!("Created: {title}"), commands);
        }
        Some(id) => {
            let Some(blocked_by) = resolve_blockers(model, &id, &form, commands) else {
                model.form = Some(form);
                return;
            };
            let branch = form.branch.trim().to_owned();
            if model.board.validate_branch_edit(&id, &branch).is_err() {
                model.form = Some(form);
                model.notify("Branch is locked by an existing worktree", commands);
                return;
            }
            if model.board.validate_blocked_by(&id, &blocked_by).is_err() {
                model.form = Some(form);
                model.notify("Edit rejected: dependency cycle", commands);
                return;
            }

            let Some(ticket) = model.board.ticket_mut(&id) else {
                model.notify("Ticket no longer exists", commands);
                model.mode = Mode::Normal;
                return;
            };
            ticket.title = title.clone();
            ticket.description = form.description.trim().to_owned();
            ticket.priority = form.priority;
            ticket.agent_type = form.selected_agent().unwrap_or_default().to_owned();
            ticket.labels = form.labels_set();
            ticket.blocked_by = blocked_by;
            if !ticket.branch_locked() {
                ticket.branch_name = branch;
            }
            ticket.touch();
            let project_id = ticket.project_id.clone();
            commands.push(model.save_command(&project_id));
            model.mode = Mode::Normal;
            model.notify(format!("Updated: {title}"), commands);
        }
    }
}

/// Resolves blocker tokens (id prefixes) to ticket ids; `None` means the
/// form stays open because a token was ambiguous or unknown.
fn resolve_blockers(
    model: &mut Model,
    editing: &TicketId,
    form: &TicketForm,
    commands: &mut Vec<Command>,
) -> Option<BTreeSet<TicketId>> {
    let mut blocked_by = BTreeSet::new();
    for token in form.blocker_tokens() {
        let matches: Vec<TicketId> = model
            .board
            .tickets()
            .filter(|ticket| &ticket.id != editing && ticket.id.as_str().starts_with(&token))
            .map(|ticket| ticket.id.clone())
            .collect();
        match matches.as_slice() {
            [only] => {
                blocked_by.insert(only.clone());
            }
            [] => {
                model.notify(format!("Unknown blocker: {token}"), commands);
                return None;
            }
            _ => {
                model.notify(format!("Ambiguous blocker: {token}"), commands);
                return None;
            }
        }
    }
    Some(blocked_by)
}

fn confirm_delete(model: &mut Model) {
    let Some(ticket) = model.selected_ticket() else {
        return;
    };
    let title = ticket.title.clone();
    let id = ticket.id.clone();
    model.confirm = Some((
        format!("Delete ticket: {title}?"),
        ConfirmAction::DeleteTicket(id),
    ));
    model.mode = Mode::Confirm;
}

/// Deletion destroys the pane before releasing the worktree and removes
/// both the ticket and its pane entry in this same update step.
fn delete_ticket(model: &mut Model, id: TicketId, commands: &mut Vec<Command>) {
    if let Some(pane) = model.panes.remove(&id) {
        let session = pane.session_id().clone();
        commands.push(Command::ClosePane {
            pane: Box::new(pane),
            session,
            final_status: None,
            cleanup_status_files: true,
        });
    }

    let Some(ticket) = model.board.remove_ticket(&id) else {
        return;
    };
    if model.focused_ticket.as_ref() == Some(&id) {
        model.focused_ticket = None;
    }
    if ticket.has_worktree() && model.config.remove_worktree_on_delete {
        if let Some(project) = model.registry.get(&ticket.project_id) {
            commands.push(Command::RemoveWorktree {
                repo_path: project.repo_path.clone(),
                worktree_path: ticket.worktree_path.clone().into(),
            });
        }
    }
    model.clamp_selection();
    commands.push(model.save_command(&ticket.project_id));
    model.notify(format!("Deleted: {}", ticket.title), commands);
}

fn move_selected_ticket(model: &mut Model, forward: bool, commands: &mut Vec<Command>) {
    let Some(ticket) = model.selected_ticket() else {
        return;
    };
    let id = ticket.id.clone();
    let project_id = ticket.project_id.clone();
    let current = ticket.status;
    let next = if forward {
        current.next()
    } else {
        current.previous()
    };
    if next == current {
        return;
    }
    if model.board.move_ticket(&id, next).is_ok() {
        model.clamp_selection();
        commands.push(model.save_command(&project_id));
        model.notify(format!("Moved to {}", next.label()), commands);
    }
}

fn spawn_agent(model: &mut Model, commands: &mut Vec<Command>) {
    let selected = model.selected_ticket().map(|ticket| {
        (
            ticket.id.clone(),
            ticket.status,
            ticket.agent_type.clone(),
            ticket.project_id.clone(),
            ticket.has_worktree(),
        )
    });
    let Some((id, status, agent_type, project_id, has_worktree)) = selected else {
        return;
    };

    if status != TicketStatus::InProgress {
        model.notify("Move ticket to In Progress first", commands);
        return;
    }
    if model.panes.contains_key(&id) {
        model.notify("Agent already running for this ticket", commands);
        return;
    }
    let repo_path = model.registry.get(&project_id).map(|p| p.repo_path.clone());
    let Some(repo_path) = repo_path else {
        model.notify("Ticket has no registered project", commands);
        return;
    };
    let agent_name = if agent_type.is_empty() {
        model.config.default_agent.clone()
    } else {
        agent_type
    };
    if model.config.agent(&agent_name).is_none() {
        model.notify(format!("Unknown agent type: {agent_name}"), commands);
        return;
    }

    model.spawning = Some(SpawnState {
        ticket: id.clone(),
        agent: agent_name,
    });
    model.mode = Mode::Spawning;

    if has_worktree {
        push_start_command(model, &id, commands);
    } else {
        let branch = format!("{}{}", model.config.branch_prefix, id.short());
        commands.push(Command::CreateWorktree {
            ticket: id,
            repo_path,
            branch,
        });
    }
}

fn handle_worktree_created(
    model: &mut Model,
    ticket_id: TicketId,
    path: std::path::PathBuf,
    branch: String,
    base_branch: String,
    commands: &mut Vec<Command>,
) {
    // A late result after the user escaped out of Spawning is dropped.
    if model.mode != Mode::Spawning
        || model
            .spawning
            .as_ref()
            .map(|state| state.ticket != ticket_id)
            .unwrap_or(true)
    {
        debug!(ticket = %ticket_id, "dropping stale worktree result");
        return;
    }
    let Some(ticket) = model.board.ticket_mut(&ticket_id) else {
        return;
    };
    ticket.worktree_path = path.to_string_lossy().to_string();
    ticket.branch_name = branch;
    ticket.base_branch = base_branch;
    ticket.touch();
    let project_id = ticket.project_id.clone();
    commands.push(model.save_command(&project_id));
    push_start_command(model, &ticket_id, commands);
}

fn push_start_command(
    model: &Model,
    ticket_id: &TicketId,
    commands: &mut Vec<Command>,
) {
    let Some(ticket) = model.board.ticket(ticket_id) else {
        return;
    };
    let Some(state) = model.spawning.as_ref() else {
        return;
    };
    let Some(agent) = model.config.agent(&state.agent) else {
        return;
    };

    let context = SpawnContext {
        title: &ticket.title,
        description: &ticket.description,
        branch_name: &ticket.branch_name,
        base_branch: &ticket.base_branch,
    };
    let resume = ticket.agent_spawned_at.is_some();
    let command = build_agent_command(agent, &context, resume, sanitized_environment());
    let session = SessionId::new(format!("{}{}", model.config.session_prefix, ticket.id.short()));
    let (cols, rows) = agent_pane_size(model);

    commands.push(Command::StartAgent {
        ticket: ticket.id.clone(),
        session,
        workdir: ticket.worktree_path.clone().into(),
        command,
        cols,
        rows,
    });
}

fn handle_spawn_complete(
    model: &mut Model,
    ticket_id: TicketId,
    pane: Box<openkanban_runtime::Pane>,
    commands: &mut Vec<Command>,
) {
    let agent_name = model
        .spawning
        .take()
        .map(|state| state.agent)
        .unwrap_or_default();

    // The ticket may have been deleted while the spawn was in flight; do
    // not leak the child.
    if model.board.ticket(&ticket_id).is_none() {
        let session = pane.session_id().clone();
        commands.push(Command::ClosePane {
            pane,
            session,
            final_status: None,
            cleanup_status_files: true,
        });
        if model.mode == Mode::Spawning {
            model.mode = Mode::Normal;
        }
        return;
    }

    let session = pane.session_id().clone();
    model.panes.insert(ticket_id.clone(), *pane);

    let Some(ticket) = model.board.ticket_mut(&ticket_id) else {
        return;
    };
    ticket.session_id = Some(session);
    ticket.agent_status = AgentStatus::Idle;
    if !agent_name.is_empty() {
        ticket.agent_type = agent_name.clone();
    }
    if ticket.agent_spawned_at.is_none() {
        ticket.agent_spawned_at = Some(SystemTime::now());
    }
    ticket.touch();
    let project_id = ticket.project_id.clone();

    model.focused_ticket = Some(ticket_id);
    model.mode = Mode::AgentView;
    resize_focused_pane(model);
    commands.push(model.save_command(&project_id));
    model.notify(format!("Spawned {agent_name} agent"), commands);
}

fn stop_agent(model: &mut Model, commands: &mut Vec<Command>) {
    let Some(id) = model.selected_ticket_id() else {
        return;
    };
    let Some(pane) = model.panes.remove(&id) else {
        model.notify("No agent session for this ticket", commands);
        return;
    };
    let session = pane.session_id().clone();
    commands.push(Command::ClosePane {
        pane: Box::new(pane),
        session,
        final_status: Some(AgentStatus::None),
        cleanup_status_files: false,
    });

    if let Some(ticket) = model.board.ticket_mut(&id) {
        ticket.session_id = None;
        ticket.agent_status = AgentStatus::None;
        ticket.touch();
        let project_id = ticket.project_id.clone();
        commands.push(model.save_command(&project_id));
    }
    if model.focused_ticket.as_ref() == Some(&id) {
        model.focused_ticket = None;
        if model.mode == Mode::AgentView {
            model.mode = Mode::Normal;
        }
    }
    model.notify("Agent stopped", commands);
}

fn attach_to_agent(model: &mut Model, commands: &mut Vec<Command>) {
    let Some(id) = model.selected_ticket_id() else {
        return;
    };
    if !model.panes.contains_key(&id) {
        model.notify("No agent session for this ticket", commands);
        return;
    }
    model.focused_ticket = Some(id);
    model.mode = Mode::AgentView;
    resize_focused_pane(model);
}

/// On quit every running pane is closed concurrently; the UI stays in
/// ShuttingDown until all exit events have arrived.
fn request_quit(model: &mut Model, commands: &mut Vec<Command>) {
    let panes: Vec<(TicketId, openkanban_runtime::Pane)> =
        model.panes.drain().collect();
    let mut touched_projects: BTreeSet<ProjectId> = BTreeSet::new();

    for (ticket_id, pane) in panes {
        let session = pane.session_id().clone();
        if pane.running() {
            model.pending_closes.insert(session.clone());
        }
        commands.push(Command::ClosePane {
            pane: Box::new(pane),
            session,
            final_status: None,
            cleanup_status_files: false,
        });
        if let Some(ticket) = model.board.ticket_mut(&ticket_id) {
            ticket.session_id = None;
            ticket.agent_status = AgentStatus::None;
            touched_projects.insert(ticket.project_id.clone());
        }
    }
    for project in touched_projects {
        commands.push(model.save_command(&project));
    }

    if model.pending_closes.is_empty() {
        model.should_quit = true;
    } else {
        model.mode = Mode::ShuttingDown;
    }
}

fn handle_pane_event(model: &mut Model, event: PaneEvent, commands: &mut Vec<Command>) {
    match event {
        // Output only invalidates the rendered frame; the loop redraws
        // after every event.
        PaneEvent::Output { .. } => {}
        PaneEvent::Exit { session, error } => {
            if model.pending_closes.remove(&session) {
                if model.mode == Mode::ShuttingDown && model.pending_closes.is_empty() {
                    model.should_quit = true;
                }
                return;
            }

            // Unexpected EOF: the agent exited on its own. The worktree is
            // kept; ticket and pane entry drop together.
            let Some(ticket_id) = model.ticket_for_session(&session) else {
                debug!(session = %session, "exit event for unknown session");
                return;
            };
            model.panes.remove(&ticket_id);
            if let Some(ticket) = model.board.ticket_mut(&ticket_id) {
                ticket.session_id = None;
                ticket.agent_status = AgentStatus::None;
                ticket.touch();
                let project_id = ticket.project_id.clone();
                commands.push(model.save_command(&project_id));
            }
            if model.focused_ticket.as_ref() == Some(&ticket_id) {
                model.focused_ticket = None;
                if model.mode == Mode::AgentView {
                    model.mode = Mode::Normal;
                }
            }
            match error {
                Some(error) => {
                    warn!(session = %session, %error, "agent pane failed");
                    model.notify(format!("Agent exited: {error}"), commands);
                }
                None => model.notify("Agent exited", commands),
            }
        }
    }
}

fn handle_tick(model: &mut Model, kind: TickKind, commands: &mut Vec<Command>) {
    match kind {
        TickKind::StatusPoll => {
            let mut inputs = Vec::new();
            for (ticket_id, pane) in &model.panes {
                let Ok(snapshot) = pane.snapshot() else {
                    continue;
                };
                inputs.push(StatusInput {
                    ticket: ticket_id.clone(),
                    session: pane.session_id().clone(),
                    screen_text: snapshot.text(),
                    running: pane.running(),
                });
            }
            if !inputs.is_empty() {
                commands.push(Command::ClassifyStatuses { inputs });
            }
            commands.push(Command::Tick {
                kind: TickKind::StatusPoll,
                delay: Duration::from_secs(model.config.poll_interval_secs()),
            });
        }
        TickKind::Animation => {
            model.animation_frame = (model.animation_frame + 1) % ANIMATION_FRAMES;
            commands.push(Command::Tick {
                kind: TickKind::Animation,
                delay: ANIMATION_INTERVAL,
            });
        }
        TickKind::NotificationExpiry => {
            let expired = model
                .notified_at
                .map(|at| at.elapsed() >= NOTIFICATION_TTL)
                .unwrap_or(false);
            if expired {
                model.notification = None;
                model.notified_at = None;
            }
        }
    }
}

fn apply_classifications(
    model: &mut Model,
    statuses: Vec<(TicketId, AgentStatus)>,
    commands: &mut Vec<Command>,
) {
    for (ticket_id, status) in statuses {
        // Late classifications for vanished tickets or panes are ignored.
        if !model.panes.contains_key(&ticket_id) {
            continue;
        }
        let Some(ticket) = model.board.ticket_mut(&ticket_id) else {
            continue;
        };
        if ticket.agent_status == status {
            continue;
        }
        ticket.agent_status = status;
        if let Some(session) = ticket.session_id.clone() {
            if status != AgentStatus::None {
                commands.push(Command::WriteStatusFile { session, status });
            }
        }
    }
}

fn save_all_projects(model: &Model, commands: &mut Vec<Command>) {
    for project in model.registry.projects() {
        commands.push(model.save_command(&project.id));
    }
}

fn resize_focused_pane(model: &mut Model) {
    if model.mode != Mode::AgentView {
        return;
    }
    let Some(ticket) = model.focused_ticket.clone() else {
        return;
    };
    let (cols, rows) = agent_pane_size(model);
    if let Some(pane) = model.panes.get_mut(&ticket) {
        if let Err(error) = pane.resize(cols, rows) {
            debug!(%error, "pane resize failed");
        }
    }
}

/// The terminal area a focused pane renders into: full width, minus the
/// header and hint rows.
fn agent_pane_size(model: &Model) -> (u16, u16) {
    let cols = if model.width == 0 { 80 } else { model.width };
    let rows = if model.height == 0 {
        24
    } else {
        model.height.saturating_sub(2).max(5)
    };
    (cols, rows)
}
