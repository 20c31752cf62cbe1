use std::collections::BTreeSet;

use openkanban_core::{Ticket, TicketId, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};

/// Fields of the create/edit ticket form, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Priority,
    Agent,
    Branch,
    Labels,
    BlockedBy,
}

const FIELD_ORDER: &[FormField] = &[
    FormField::Title,
    FormField::Description,
    FormField::Priority,
    FormField::Agent,
    FormField::Branch,
    FormField::Labels,
    FormField::BlockedBy,
];

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Priority => "Priority",
            Self::Agent => "Agent",
            Self::Branch => "Branch",
            Self::Labels => "Labels",
            Self::BlockedBy => "Blocked by",
        }
    }
}

/// Form state for creating or editing a ticket. Text fields edit in place;
/// priority and agent cycle through fixed choices; the branch field locks
/// once the ticket has a worktree.
#[derive(Debug, Clone)]
pub struct TicketForm {
    pub editing: Option<TicketId>,
    pub focus: FormField,
    pub title: String,
    pub description: String,
    pub priority: u8,
    pub agent_choices: Vec<String>,
    pub agent_index: usize,
    pub branch: String,
    pub branch_locked: bool,
    pub labels: String,
    pub blocked_by: String,
}

impl TicketForm {
    pub fn create(agent_choices: Vec<String>, default_agent: &str) -> Self {
        let agent_index = agent_choices
            .iter()
            .position(|name| name == default_agent)
            .unwrap_or(0);
        Self {
            editing: None,
            focus: FormField::Title,
            title: String::new(),
            description: String::new(),
            priority: DEFAULT_PRIORITY,
            agent_choices,
            agent_index,
            branch: String::new(),
            branch_locked: false,
            labels: String::new(),
            blocked_by: String::new(),
        }
    }

    pub fn edit(ticket: &Ticket, agent_choices: Vec<String>) -> Self {
        let agent_index = agent_choices
            .iter()
            .position(|name| name == &ticket.agent_type)
            .unwrap_or(0);
        Self {
            editing: Some(ticket.id.clone()),
            focus: FormField::Title,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            priority: ticket.priority,
            agent_choices,
            agent_index,
            branch: ticket.branch_name.clone(),
            branch_locked: ticket.branch_locked(),
            labels: join_set(&ticket.labels),
            blocked_by: ticket
                .blocked_by
                .iter()
                .map(|id| id.short().to_owned())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn focus_next(&mut self) {
        self.shift_focus(1);
    }

    pub fn focus_previous(&mut self) {
        self.shift_focus(-1);
    }

    fn shift_focus(&mut self, delta: isize) {
        let index = FIELD_ORDER
            .iter()
            .position(|field| *field == self.focus)
            .unwrap_or(0) as isize;
        let len = FIELD_ORDER.len() as isize;
        let next = (index + delta).rem_euclid(len) as usize;
        self.focus = FIELD_ORDER[next];
    }

    pub fn selected_agent(&self) -> Option<&str> {
        self.agent_choices
            .get(self.agent_index)
            .map(String::as_str)
    }

    pub fn cycle_agent(&mut self, delta: isize) {
        if self.agent_choices.is_empty() {
            return;
        }
        let len = self.agent_choices.len() as isize;
        self.agent_index = ((self.agent_index as isize + delta).rem_euclid(len)) as usize;
    }

    pub fn adjust_priority(&mut self, delta: i8) {
        let next = (self.priority as i8 + delta).clamp(MIN_PRIORITY as i8, MAX_PRIORITY as i8);
        self.priority = next as u8;
    }

    pub fn set_priority_digit(&mut self, digit: char) {
        if let Some(value) = digit.to_digit(10) {
            let value = value as u8;
            if (MIN_PRIORITY..=MAX_PRIORITY).contains(&value) {
                self.priority = value;
            }
        }
    }

    pub fn push_char(&mut self, c: char) {
        match self.focus {
            FormField::Title => self.title.push(c),
            FormField::Description => self.description.push(c),
            FormField::Priority => self.set_priority_digit(c),
            FormField::Agent => {}
            FormField::Branch => {
                if !self.branch_locked {
                    self.branch.push(c);
                }
            }
            FormField::Labels => self.labels.push(c),
            FormField::BlockedBy => self.blocked_by.push(c),
        }
    }

    pub fn pop_char(&mut self) {
        match self.focus {
            FormField::Title => {
                self.title.pop();
            }
            FormField::Description => {
                self.description.pop();
            }
            FormField::Priority | FormField::Agent => {}
            FormField::Branch => {
                if !self.branch_locked {
                    self.branch.pop();
                }
            }
            FormField::Labels => {
                self.labels.pop();
            }
            FormField::BlockedBy => {
                self.blocked_by.pop();
            }
        }
    }

    pub fn labels_set(&self) -> BTreeSet<String> {
        self.labels
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Raw blocker tokens; the update step resolves them against the board
    /// by id prefix.
    pub fn blocker_tokens(&self) -> Vec<String> {
        self.blocked_by
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

fn join_set(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}
