mod command;
mod event;
mod filter;
mod form;
mod model;
mod mode;
mod update;
mod view;

pub use command::{Command, StatusInput};
pub use event::{Event, TickKind};
pub use filter::{FilterQuery, FilterState};
pub use form::{FormField, TicketForm};
pub use model::{ConfirmAction, Model, ProjectForm, SpawnState};
pub use mode::Mode;
pub use update::{init_commands, update};
pub use view::view;

use std::time::Duration;

pub const ANIMATION_INTERVAL: Duration = Duration::from_millis(500);
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);
pub const ANIMATION_FRAMES: usize = 4;
pub const MIN_COLUMN_WIDTH: u16 = 20;
