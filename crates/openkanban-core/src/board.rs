use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, Ticket, TicketId, TicketStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub title: String,
    pub status: TicketStatus,
}

/// The board owns its tickets exclusively; everything else refers to them
/// by id.
#[derive(Debug, Clone, Default)]
pub struct Board {
    columns: Vec<Column>,
    tickets: HashMap<TicketId, Ticket>,
}

impl Board {
    pub fn new() -> Self {
        Self {
            columns: vec![
                Column {
                    title: "Backlog".to_owned(),
                    status: TicketStatus::Backlog,
                },
                Column {
                    title: "In Progress".to_owned(),
                    status: TicketStatus::InProgress,
                },
                Column {
                    title: "Done".to_owned(),
                    status: TicketStatus::Done,
                },
            ],
            tickets: HashMap::new(),
        }
    }

    pub fn with_tickets(tickets: Vec<Ticket>) -> Self {
        let mut board = Self::new();
        for ticket in tickets {
            board.tickets.insert(ticket.id.clone(), ticket);
        }
        board
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn ticket(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.get(id)
    }

    pub fn ticket_mut(&mut self, id: &TicketId) -> Option<&mut Ticket> {
        self.tickets.get_mut(id)
    }

    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn add_ticket(&mut self, ticket: Ticket) {
        self.tickets.insert(ticket.id.clone(), ticket);
    }

    pub fn remove_ticket(&mut self, id: &TicketId) -> Option<Ticket> {
        let removed = self.tickets.remove(id);
        if removed.is_some() {
            for ticket in self.tickets.values_mut() {
                ticket.blocked_by.remove(id);
            }
        }
        removed
    }

    pub fn move_ticket(&mut self, id: &TicketId, status: TicketStatus) -> CoreResult<()> {
        let ticket = self
            .tickets
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownTicket(id.as_str().to_owned()))?;
        ticket.status = status;
        ticket.touch();
        Ok(())
    }

    /// Tickets in a column, sorted by priority (lower value first), then by
    /// creation time so the ordering is stable across polls.
    pub fn tickets_by_status(&self, status: TicketStatus) -> Vec<&Ticket> {
        let mut tickets: Vec<&Ticket> = self
            .tickets
            .values()
            .filter(|ticket| ticket.status == status)
            .collect();
        tickets.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        tickets
    }

    /// Refuses a branch rename for a ticket whose worktree already exists.
    pub fn validate_branch_edit(&self, id: &TicketId, new_branch: &str) -> CoreResult<()> {
        let ticket = self
            .tickets
            .get(id)
            .ok_or_else(|| CoreError::UnknownTicket(id.as_str().to_owned()))?;
        if ticket.branch_locked() && ticket.branch_name != new_branch {
            return Err(CoreError::BranchLocked(ticket.branch_name.clone()));
        }
        Ok(())
    }

    /// Rejects a blocked-by edit that would introduce a cycle. The proposed
    /// set replaces the ticket's current one for the check.
    pub fn validate_blocked_by(
        &self,
        id: &TicketId,
        proposed: &BTreeSet<TicketId>,
    ) -> CoreResult<()> {
        if proposed.contains(id) {
            return Err(CoreError::DependencyCycle(id.as_str().to_owned()));
        }

        // DFS from each proposed blocker; reaching `id` again closes a cycle.
        let mut stack: Vec<&TicketId> = proposed.iter().collect();
        let mut visited: BTreeSet<&TicketId> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == id {
                return Err(CoreError::DependencyCycle(id.as_str().to_owned()));
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(ticket) = self.tickets.get(current) {
                stack.extend(ticket.blocked_by.iter());
            }
        }
        Ok(())
    }

    pub fn into_tickets(self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.tickets.into_values().collect();
        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        tickets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectId;

    fn ticket(title: &str) -> Ticket {
        Ticket::new(ProjectId::new("proj-1"), title)
    }

    #[test]
    fn tickets_by_status_orders_by_priority() {
        let mut board = Board::new();
        let mut urgent = ticket("urgent");
        urgent.priority = 1;
        let mut background = ticket("background");
        background.priority = 5;
        let urgent_id = urgent.id.clone();

        board.add_ticket(background);
        board.add_ticket(urgent);

        let backlog = board.tickets_by_status(TicketStatus::Backlog);
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[0].id, urgent_id);
    }

    #[test]
    fn remove_ticket_clears_dangling_blockers() {
        let mut board = Board::new();
        let blocker = ticket("blocker");
        let blocker_id = blocker.id.clone();
        let mut blocked = ticket("blocked");
        blocked.blocked_by.insert(blocker_id.clone());
        let blocked_id = blocked.id.clone();

        board.add_ticket(blocker);
        board.add_ticket(blocked);
        board.remove_ticket(&blocker_id);

        let remaining = board.ticket(&blocked_id).expect("blocked ticket remains");
        assert!(remaining.blocked_by.is_empty());
    }

    #[test]
    fn branch_edit_is_refused_once_worktree_exists() {
        let mut board = Board::new();
        let mut locked = ticket("locked");
        locked.branch_name = "task/abc12345".to_owned();
        locked.worktree_path = "/tmp/wt".to_owned();
        let id = locked.id.clone();
        board.add_ticket(locked);

        assert!(board.validate_branch_edit(&id, "task/other").is_err());
        assert!(board.validate_branch_edit(&id, "task/abc12345").is_ok());
    }

    #[test]
    fn blocked_by_rejects_direct_and_transitive_cycles() {
        let mut board = Board::new();
        let a = ticket("a");
        let b = ticket("b");
        let c = ticket("c");
        let (id_a, id_b, id_c) = (a.id.clone(), b.id.clone(), c.id.clone());
        board.add_ticket(a);
        board.add_ticket(b);
        board.add_ticket(c);

        // a <- b <- c is fine.
        let mut blockers = BTreeSet::new();
        blockers.insert(id_a.clone());
        assert!(board.validate_blocked_by(&id_b, &blockers).is_ok());
        board
            .ticket_mut(&id_b)
            .expect("ticket b")
            .blocked_by
            .insert(id_a.clone());

        let mut blockers = BTreeSet::new();
        blockers.insert(id_b.clone());
        assert!(board.validate_blocked_by(&id_c, &blockers).is_ok());
        board
            .ticket_mut(&id_c)
            .expect("ticket c")
            .blocked_by
            .insert(id_b.clone());

        // a blocked by c closes the loop.
        let mut blockers = BTreeSet::new();
        blockers.insert(id_c);
        assert!(matches!(
            board.validate_blocked_by(&id_a, &blockers),
            Err(CoreError::DependencyCycle(_))
        ));

        // Self-reference is a cycle of length one.
        let mut blockers = BTreeSet::new();
        blockers.insert(id_a.clone());
        assert!(board.validate_blocked_by(&id_a, &blockers).is_err());
    }

    #[test]
    fn move_ticket_rejects_unknown_ids() {
        let mut board = Board::new();
        let error = board
            .move_ticket(&TicketId::new("missing"), TicketStatus::Done)
            .expect_err("missing ticket should fail");
        assert!(matches!(error, CoreError::UnknownTicket(_)));
    }
}
