use std::collections::BTreeSet;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{ProjectId, SessionId, TicketId};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;
pub const DEFAULT_PRIORITY: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Backlog,
    InProgress,
    Done,
}

impl TicketStatus {
    /// Column order: Backlog -> InProgress -> Done. Done is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Backlog => Self::InProgress,
            Self::InProgress => Self::Done,
            Self::Done => Self::Done,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Self::Backlog => Self::Backlog,
            Self::InProgress => Self::Backlog,
            Self::Done => Self::InProgress,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    None,
    Idle,
    Working,
    Waiting,
    Completed,
    Error,
}

impl AgentStatus {
    /// The wire token used by the status-file layout. `None` has no token;
    /// it is never written to disk.
    pub fn token(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Idle => Some("idle"),
            Self::Working => Some("working"),
            Self::Waiting => Some("waiting"),
            Self::Completed => Some("completed"),
            Self::Error => Some("error"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub agent_status: AgentStatus,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub worktree_path: String,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub base_branch: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub blocked_by: BTreeSet<TicketId>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default, with = "epoch_seconds_opt")]
    pub agent_spawned_at: Option<SystemTime>,
    #[serde(with = "epoch_seconds")]
    pub created_at: SystemTime,
    #[serde(with = "epoch_seconds")]
    pub updated_at: SystemTime,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// Now, truncated to whole seconds so timestamps survive the store's
/// epoch-seconds encoding unchanged.
fn now_secs() -> SystemTime {
    use std::time::{Duration, UNIX_EPOCH};
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    UNIX_EPOCH + Duration::from_secs(seconds)
}

impl Ticket {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        let now = now_secs();
        Self {
            id: TicketId::generate(),
            project_id,
            title: title.into(),
            description: String::new(),
            status: TicketStatus::Backlog,
            agent_status: AgentStatus::None,
            agent_type: String::new(),
            worktree_path: String::new(),
            branch_name: String::new(),
            base_branch: String::new(),
            priority: DEFAULT_PRIORITY,
            labels: BTreeSet::new(),
            blocked_by: BTreeSet::new(),
            session_id: None,
            agent_spawned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_worktree(&self) -> bool {
        !self.worktree_path.is_empty()
    }

    /// Once a worktree exists the branch is locked; the edit form refuses
    /// renames (see `Board::validate_branch_edit`).
    pub fn branch_locked(&self) -> bool {
        self.has_worktree()
    }

    pub fn touch(&mut self) {
        self.updated_at = now_secs();
    }
}

mod epoch_seconds {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let seconds = value
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        serializer.serialize_u64(seconds)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let seconds = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(seconds))
    }
}

mod epoch_seconds_opt {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<SystemTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => {
                let seconds = time
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_secs();
                serializer.serialize_some(&seconds)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SystemTime>, D::Error> {
        let seconds = Option::<u64>::deserialize(deserializer)?;
        Ok(seconds.map(|value| UNIX_EPOCH + Duration::from_secs(value)))
    }
}
