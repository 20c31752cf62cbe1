mod runner;
mod worktree;

pub use runner::{CommandRunner, ProcessCommandRunner};
pub use worktree::{sanitize_branch_component, WorktreeManager};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("worktree already exists: {0}")]
    WorktreeExists(PathBuf),
    #[error("invalid branch name: {0}")]
    BranchInvalid(String),
    #[error("git error: {0}")]
    Git(String),
}

pub type VcsResult<T> = Result<T, VcsError>;
