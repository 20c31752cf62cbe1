use std::fmt;
use std::path::PathBuf;

use crossterm::event::KeyEvent;

use openkanban_core::{AgentStatus, TicketId};
use openkanban_runtime::{Pane, PaneEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    StatusPoll,
    Animation,
    NotificationExpiry,
}

/// Everything the update loop can consume. External inputs, timer ticks,
/// pane notifications, and command results all arrive through one queue and
/// are applied strictly in order.
pub enum Event {
    Key(KeyEvent),
    Resize(u16, u16),
    Tick(TickKind),
    Pane(PaneEvent),
    WorktreeCreated {
        ticket: TicketId,
        path: PathBuf,
        branch: String,
        base_branch: String,
    },
    SpawnComplete {
        ticket: TicketId,
        pane: Box<Pane>,
    },
    SpawnFailed {
        ticket: TicketId,
        error: String,
    },
    StatusesClassified(Vec<(TicketId, AgentStatus)>),
    Notification(String),
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Resize(cols, rows) => f.debug_tuple("Resize").field(cols).field(rows).finish(),
            Self::Tick(kind) => f.debug_tuple("Tick").field(kind).finish(),
            Self::Pane(event) => f.debug_tuple("Pane").field(event).finish(),
            Self::WorktreeCreated {
                ticket,
                path,
                branch,
                base_branch,
            } => f
                .debug_struct("WorktreeCreated")
                .field("ticket", ticket)
                .field("path", path)
                .field("branch", branch)
                .field("base_branch", base_branch)
                .finish(),
            Self::SpawnComplete { ticket, .. } => f
                .debug_struct("SpawnComplete")
                .field("ticket", ticket)
                .finish_non_exhaustive(),
            Self::SpawnFailed { ticket, error } => f
                .debug_struct("SpawnFailed")
                .field("ticket", ticket)
                .field("error", error)
                .finish(),
            Self::StatusesClassified(statuses) => f
                .debug_tuple("StatusesClassified")
                .field(statuses)
                .finish(),
            Self::Notification(text) => f.debug_tuple("Notification").field(text).finish(),
        }
    }
}
