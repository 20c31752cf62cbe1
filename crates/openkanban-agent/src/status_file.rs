use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use openkanban_core::{AgentStatus, SessionId};

/// Foreign dir first: hooks shipped with the agent CLIs write there and
/// their signal is considered more reliable than our own side-channel.
const FOREIGN_STATUS_DIR: &str = "claude-status";
const OWN_STATUS_DIR: &str = "openkanban-status";
const STATUS_EXTENSION: &str = "status";

/// `~/.cache/claude-status` and `~/.cache/openkanban-status`, probed in
/// that order.
pub fn default_status_dirs() -> Vec<PathBuf> {
    let Some(home) = resolve_home_dir() else {
        return Vec::new();
    };
    let cache = home.join(".cache");
    vec![cache.join(FOREIGN_STATUS_DIR), cache.join(OWN_STATUS_DIR)]
}

pub fn status_file_path(dir: &Path, session: &SessionId) -> PathBuf {
    dir.join(format!("{}.{STATUS_EXTENSION}", session.as_str()))
}

/// Persists the last-observed status for external dashboards. Callers treat
/// failures as non-fatal; this is a side channel, not the source of truth.
pub fn write_status_file(session: &SessionId, status: AgentStatus) -> io::Result<()> {
    let Some(home) = resolve_home_dir() else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "home directory is not resolvable",
        ));
    };
    let dir = home.join(".cache").join(OWN_STATUS_DIR);
    write_status_file_in(&dir, session, status)
}

pub fn write_status_file_in(
    dir: &Path,
    session: &SessionId,
    status: AgentStatus,
) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let token = status.token().unwrap_or("idle");
    fs::write(status_file_path(dir, session), format!("{token}\n"))
}

/// Removes the session's status file from every known directory.
pub fn cleanup_status_files(session: &SessionId) {
    cleanup_status_files_in(&default_status_dirs(), session);
}

pub fn cleanup_status_files_in(dirs: &[PathBuf], session: &SessionId) {
    for dir in dirs {
        let _ = fs::remove_file(status_file_path(dir, session));
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    for key in ["HOME", "USERPROFILE"] {
        if let Ok(value) = std::env::var(key) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(PathBuf::from(value));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_file_carries_token_and_newline() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = SessionId::new("ok-12345678");

        write_status_file_in(dir.path(), &session, AgentStatus::Working)
            .expect("write status file");

        let contents = fs::read_to_string(status_file_path(dir.path(), &session))
            .expect("read status file");
        assert_eq!(contents, "working\n");
    }

    #[test]
    fn none_status_is_written_as_idle() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = SessionId::new("ok-12345678");

        write_status_file_in(dir.path(), &session, AgentStatus::None)
            .expect("write status file");

        let contents = fs::read_to_string(status_file_path(dir.path(), &session))
            .expect("read status file");
        assert_eq!(contents, "idle\n");
    }

    #[test]
    fn cleanup_removes_files_from_every_directory() {
        let first = tempfile::tempdir().expect("create temp dir");
        let second = tempfile::tempdir().expect("create temp dir");
        let session = SessionId::new("ok-12345678");

        write_status_file_in(first.path(), &session, AgentStatus::Idle).expect("write first");
        write_status_file_in(second.path(), &session, AgentStatus::Idle).expect("write second");

        cleanup_status_files_in(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            &session,
        );
        assert!(!status_file_path(first.path(), &session).exists());
        assert!(!status_file_path(second.path(), &session).exists());
    }

    #[test]
    fn cleanup_of_missing_files_is_silent() {
        let dir = tempfile::tempdir().expect("create temp dir");
        cleanup_status_files_in(&[dir.path().to_path_buf()], &SessionId::new("ok-unknown"));
    }
}
