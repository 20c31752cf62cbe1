use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("unknown ticket: {0}")]
    UnknownTicket(String),
    #[error("dependency cycle: {0}")]
    DependencyCycle(String),
    #[error("branch is locked by worktree: {0}")]
    BranchLocked(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
