use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use openkanban_agent::AgentCommand;
use openkanban_core::{AgentStatus, Project, ProjectId, SessionId, Ticket, TicketId};
use openkanban_runtime::Pane;

use crate::TickKind;

/// One classification request for a ticket with an active pane; the update
/// step gathers these so the blocking file reads happen off-loop.
#[derive(Debug, Clone)]
pub struct StatusInput {
    pub ticket: TicketId,
    pub session: SessionId,
    pub screen_text: String,
    pub running: bool,
}

/// Work the update step schedules instead of performing. Every command runs
/// on a worker and resolves to at most one event posted back to the queue.
pub enum Command {
    Tick {
        kind: TickKind,
        delay: Duration,
    },
    CreateWorktree {
        ticket: TicketId,
        repo_path: PathBuf,
        branch: String,
    },
    StartAgent {
        ticket: TicketId,
        session: SessionId,
        workdir: PathBuf,
        command: AgentCommand,
        cols: u16,
        rows: u16,
    },
    ClosePane {
        pane: Box<Pane>,
        session: SessionId,
        /// Written to the side-channel status file after the close, best
        /// effort.
        final_status: Option<AgentStatus>,
        /// Deletion also scrubs the session's status files.
        cleanup_status_files: bool,
    },
    RemoveWorktree {
        repo_path: PathBuf,
        worktree_path: PathBuf,
    },
    SaveTickets {
        project: ProjectId,
        tickets: Vec<Ticket>,
    },
    SaveProjects {
        projects: Vec<Project>,
    },
    ClassifyStatuses {
        inputs: Vec<StatusInput>,
    },
    WriteStatusFile {
        session: SessionId,
        status: AgentStatus,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tick { kind, delay } => f
                .debug_struct("Tick")
                .field("kind", kind)
                .field("delay", delay)
                .finish(),
            Self::CreateWorktree {
                ticket,
                repo_path,
                branch,
            } => f
                .debug_struct("CreateWorktree")
                .field("ticket", ticket)
                .field("repo_path", repo_path)
                .field("branch", branch)
                .finish(),
            Self::StartAgent {
                ticket,
                session,
                workdir,
                command,
                cols,
                rows,
            } => f
                .debug_struct("StartAgent")
                .field("ticket", ticket)
                .field("session", session)
                .field("workdir", workdir)
                .field("command", command)
                .field("cols", cols)
                .field("rows", rows)
                .finish(),
            Self::ClosePane {
                session,
                final_status,
                cleanup_status_files,
                ..
            } => f
                .debug_struct("ClosePane")
                .field("session", session)
                .field("final_status", final_status)
                .field("cleanup_status_files", cleanup_status_files)
                .finish_non_exhaustive(),
            Self::RemoveWorktree {
                repo_path,
                worktree_path,
            } => f
                .debug_struct("RemoveWorktree")
                .field("repo_path", repo_path)
                .field("worktree_path", worktree_path)
                .finish(),
            Self::SaveTickets { project, tickets } => f
                .debug_struct("SaveTickets")
                .field("project", project)
                .field("tickets", &tickets.len())
                .finish(),
            Self::SaveProjects { projects } => f
                .debug_struct("SaveProjects")
                .field("projects", &projects.len())
                .finish(),
            Self::ClassifyStatuses { inputs } => f
                .debug_struct("ClassifyStatuses")
                .field("inputs", &inputs.len())
                .finish(),
            Self::WriteStatusFile { session, status } => f
                .debug_struct("WriteStatusFile")
                .field("session", session)
                .field("status", status)
                .finish(),
        }
    }
}
