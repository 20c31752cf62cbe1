mod classifier;
mod command;
mod status_file;

pub use classifier::StatusDetector;
pub use command::{build_agent_command, render_prompt, AgentCommand, SpawnContext};
pub use status_file::{cleanup_status_files, default_status_dirs, write_status_file};
