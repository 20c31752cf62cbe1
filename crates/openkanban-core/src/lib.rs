mod board;
mod error;
mod identifiers;
mod project;
mod store;
mod ticket;

pub use board::{Board, Column};
pub use error::{CoreError, CoreResult};
pub use identifiers::{ProjectId, SessionId, TicketId};
pub use project::{Project, ProjectRegistry};
pub use store::TicketStore;
pub use ticket::{
    AgentStatus, Ticket, TicketStatus, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY,
};
