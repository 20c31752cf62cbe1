use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use openkanban_config::Config;
use openkanban_core::{
    Board, Project, ProjectId, ProjectRegistry, SessionId, Ticket, TicketId, TicketStatus,
};
use openkanban_runtime::Pane;

use crate::{Command, FilterState, Mode, TicketForm, MIN_COLUMN_WIDTH};

/// Border columns plus the gap between adjacent kanban columns.
pub(crate) const COLUMN_OVERHEAD: u16 = 3;

/// What the confirm overlay will do on `y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteTicket(TicketId),
}

/// In-flight spawn bookkeeping while the UI sits in `Spawning` mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnState {
    pub ticket: TicketId,
    pub agent: String,
}

/// The two-field register-project form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectForm {
    pub name: String,
    pub repo_path: String,
    pub editing_path: bool,
}

/// The single source of truth the update step mutates and the view renders.
/// Panes are owned here exclusively and never leave the update thread
/// except by being moved into a close command.
pub struct Model {
    pub config: Arc<Config>,
    pub board: Board,
    pub registry: ProjectRegistry,
    pub panes: HashMap<TicketId, Pane>,

    pub mode: Mode,
    pub active_column: usize,
    pub active_ticket: usize,
    pub width: u16,
    pub height: u16,
    pub animation_frame: usize,
    pub scroll_offset: usize,
    pub show_sidebar: bool,

    pub filter: FilterState,
    pub notification: Option<String>,
    pub notified_at: Option<Instant>,
    pub confirm: Option<(String, ConfirmAction)>,
    pub form: Option<TicketForm>,
    pub command_input: String,
    pub project_form: Option<ProjectForm>,

    pub focused_ticket: Option<TicketId>,
    pub spawning: Option<SpawnState>,
    pub pending_closes: HashSet<SessionId>,
    pub should_quit: bool,
    pub active_project: Option<ProjectId>,
}

impl Model {
    pub fn new(config: Arc<Config>, board: Board, registry: ProjectRegistry) -> Self {
        let active_project = registry.projects().first().map(|project| project.id.clone());
        Self {
            config,
            board,
            registry,
            panes: HashMap::new(),
            mode: Mode::Normal,
            active_column: 0,
            active_ticket: 0,
            width: 0,
            height: 0,
            animation_frame: 0,
            scroll_offset: 0,
            show_sidebar: false,
            filter: FilterState::default(),
            notification: None,
            notified_at: None,
            confirm: None,
            form: None,
            command_input: String::new(),
            project_form: None,
            focused_ticket: None,
            spawning: None,
            pending_closes: HashSet::new(),
            should_quit: false,
            active_project,
        }
    }

    /// Tickets of one column after the filter, in board order.
    pub fn visible_tickets(&self, status: TicketStatus) -> Vec<&Ticket> {
        self.board
            .tickets_by_status(status)
            .into_iter()
            .filter(|ticket| self.filter.query.matches(ticket, &self.registry))
            .collect()
    }

    pub fn selected_ticket_id(&self) -> Option<TicketId> {
        let column = self.board.columns().get(self.active_column)?;
        let tickets = self.visible_tickets(column.status);
        tickets
            .get(self.active_ticket)
            .map(|ticket| ticket.id.clone())
    }

    pub fn selected_ticket(&self) -> Option<&Ticket> {
        let id = self.selected_ticket_id()?;
        self.board.ticket(&id)
    }

    pub fn notify(&mut self, text: impl Into<String>, commands: &mut Vec<Command>) {
        self.notification = Some(text.into());
        self.notified_at = Some(Instant::now());
        commands.push(Command::Tick {
            kind: crate::TickKind::NotificationExpiry,
            delay: crate::NOTIFICATION_TTL,
        });
    }

    pub fn running_pane_count(&self) -> usize {
        self.panes.values().filter(|pane| pane.running()).count()
    }

    pub fn ticket_for_session(&self, session: &SessionId) -> Option<TicketId> {
        self.board
            .tickets()
            .find(|ticket| ticket.session_id.as_ref() == Some(session))
            .map(|ticket| ticket.id.clone())
    }

    pub fn project_for_ticket(&self, ticket: &Ticket) -> Option<&Project> {
        self.registry.get(&ticket.project_id)
    }

    /// Snapshot-save command for one project's tickets. The in-memory board
    /// stays authoritative; a failed save only surfaces a notification.
    pub fn save_command(&self, project: &ProjectId) -> Command {
        let tickets: Vec<Ticket> = self
            .board
            .tickets()
            .filter(|ticket| &ticket.project_id == project)
            .cloned()
            .collect();
        Command::SaveTickets {
            project: project.clone(),
            tickets,
        }
    }

    pub fn clamp_selection(&mut self) {
        let columns = self.board.columns().len();
        if columns == 0 {
            self.active_column = 0;
            self.active_ticket = 0;
            return;
        }
        self.active_column = self.active_column.min(columns - 1);
        let status = self.board.columns()[self.active_column].status;
        let count = self.visible_tickets(status).len();
        self.active_ticket = if count == 0 {
            0
        } else {
            self.active_ticket.min(count - 1)
        };
    }

    /// Width of the board area available for the column strip.
    pub fn board_width(&self) -> u16 {
        if self.show_sidebar {
            self.width.saturating_sub(24)
        } else {
            self.width
        }
    }

    pub fn column_width(&self) -> u16 {
        let columns = self.board.columns().len() as u16;
        if columns == 0 || self.width == 0 {
            return MIN_COLUMN_WIDTH;
        }
        let available = self.board_width();
        let per_column = (available / columns).saturating_sub(COLUMN_OVERHEAD);
        per_column.max(MIN_COLUMN_WIDTH)
    }

    pub fn visible_column_count(&self) -> usize {
        let columns = self.board.columns().len();
        if self.width == 0 {
            return columns;
        }
        let slot = self.column_width() + COLUMN_OVERHEAD;
        let visible = (self.board_width() / slot.max(1)) as usize;
        visible.clamp(1, columns.max(1))
    }

    /// Keeps the active column inside the visible window, adjusting the
    /// horizontal scroll offset.
    pub fn ensure_column_visible(&mut self) {
        let visible = self.visible_column_count();
        if self.active_column < self.scroll_offset {
            self.scroll_offset = self.active_column;
        } else if self.active_column >= self.scroll_offset + visible {
            self.scroll_offset = self.active_column + 1 - visible;
        }
        let max_offset = self.board.columns().len().saturating_sub(visible);
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    pub fn columns_clipped(&self) -> (bool, bool) {
        let visible = self.visible_column_count();
        (
            self.scroll_offset > 0,
            self.scroll_offset + visible < self.board.columns().len(),
        )
    }
}
