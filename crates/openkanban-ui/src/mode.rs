/// The closed set of UI modes. Each mode routes key input through its own
/// handler; transitions happen only inside the update step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Normal,
    /// Reserved; no handler routes here yet.
    Insert,
    Command,
    Help,
    Confirm,
    CreateTicket,
    EditTicket,
    AgentView,
    Settings,
    Filter,
    CreateProject,
    Spawning,
    ShuttingDown,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
            Self::Command => "COMMAND",
            Self::Help => "HELP",
            Self::Confirm => "CONFIRM",
            Self::CreateTicket => "CREATE",
            Self::EditTicket => "EDIT",
            Self::AgentView => "AGENT",
            Self::Settings => "SETTINGS",
            Self::Filter => "FILTER",
            Self::CreateProject => "PROJECT",
            Self::Spawning => "SPAWNING",
            Self::ShuttingDown => "QUITTING",
        }
    }

    /// Overlay modes render centered over the board instead of replacing it.
    pub fn is_overlay(self) -> bool {
        matches!(
            self,
            Self::Help
                | Self::Confirm
                | Self::CreateTicket
                | Self::EditTicket
                | Self::Settings
                | Self::CreateProject
                | Self::Spawning
                | Self::ShuttingDown
        )
    }
}
