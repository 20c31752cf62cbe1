use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::trace;

use openkanban_core::{AgentStatus, SessionId};

use crate::status_file::{default_status_dirs, status_file_path};

const CACHE_EXPIRY: Duration = Duration::from_millis(500);
const RECENT_ROWS: usize = 10;

const WORKING_INDICATORS: &[&str] = &[
    "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
    "◐", "◓", "◑", "◒",
    "▁", "▂", "▃", "▄", "▅", "▆", "▇", "█",
    "...",
    "Thinking", "Writing", "Reading", "Analyzing", "Processing",
    "Working", "Loading", "Searching", "Generating",
    "Executing", "Running",
];

const WAITING_INDICATORS: &[&str] = &[
    "[Y/n]", "[y/N]", "(y/n)",
    "Allow?", "Approve?", "Confirm?",
    "Press", "Enter to",
    "permission",
];

// The one screen rule that can yield Completed; everything else relies on
// status files.
const COMPLETED_INDICATOR: &str = "Session ended";

const IDLE_PROMPT_SUFFIXES: &[&str] = &[
    ">", "$", "❯", "→", ">>", "%",
    "claude>", "opencode>", "aider>",
];

const IDLE_PHRASES: &[&str] = &["what would you like", "how can i help", "enter your"];

struct CachedStatus {
    status: AgentStatus,
    captured_at: Instant,
}

/// Reduces (pane liveness, status files, screen contents) into one agent
/// status, memoised per session for a short window. Shared between the poll
/// tick and the pane read path, hence the read/write lock.
pub struct StatusDetector {
    cache: RwLock<HashMap<SessionId, CachedStatus>>,
    expiry: Duration,
    status_dirs: Vec<PathBuf>,
}

impl Default for StatusDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDetector {
    pub fn new() -> Self {
        Self::with_dirs(default_status_dirs(), CACHE_EXPIRY)
    }

    pub fn with_dirs(status_dirs: Vec<PathBuf>, expiry: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            expiry,
            status_dirs,
        }
    }

    /// The classification decision procedure. Status files written by agent
    /// hooks win over screen heuristics; a dead pane is always `None`.
    pub fn detect(
        &self,
        session: &SessionId,
        screen_text: &str,
        process_running: bool,
    ) -> AgentStatus {
        if !process_running {
            return AgentStatus::None;
        }

        if let Some(cached) = self.fresh_cached(session) {
            return cached;
        }

        let status = self
            .read_status_files(session)
            .unwrap_or_else(|| analyze_screen(screen_text));
        trace!(session = %session, status = status.label(), "classified agent status");

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                session.clone(),
                CachedStatus {
                    status,
                    captured_at: Instant::now(),
                },
            );
        }
        status
    }

    /// Drops one session's memoised entry, or every entry when `None`.
    pub fn invalidate(&self, session: Option<&SessionId>) {
        let Ok(mut cache) = self.cache.write() else {
            return;
        };
        match session {
            Some(session) => {
                cache.remove(session);
            }
            None => cache.clear(),
        }
    }

    /// When the current entry for the session was captured, if any.
    pub fn captured_at(&self, session: &SessionId) -> Option<Instant> {
        let cache = self.cache.read().ok()?;
        cache.get(session).map(|entry| entry.captured_at)
    }

    fn fresh_cached(&self, session: &SessionId) -> Option<AgentStatus> {
        let cache = self.cache.read().ok()?;
        let cached = cache.get(session)?;
        // An entry exactly at expiry counts as expired.
        if cached.captured_at.elapsed() < self.expiry {
            Some(cached.status)
        } else {
            None
        }
    }

    fn read_status_files(&self, session: &SessionId) -> Option<AgentStatus> {
        if session.is_empty() {
            return None;
        }
        for dir in &self.status_dirs {
            let Ok(contents) = fs::read_to_string(status_file_path(dir, session)) else {
                continue;
            };
            if let Some(status) = parse_status_token(contents.trim()) {
                return Some(status);
            }
            // Unrecognised contents fall through to the next source.
        }
        None
    }
}

fn parse_status_token(token: &str) -> Option<AgentStatus> {
    match token {
        "working" => Some(AgentStatus::Working),
        "done" | "idle" => Some(AgentStatus::Idle),
        "waiting" | "permission" => Some(AgentStatus::Waiting),
        "error" => Some(AgentStatus::Error),
        "completed" => Some(AgentStatus::Completed),
        _ => None,
    }
}

fn analyze_screen(content: &str) -> AgentStatus {
    if content.trim().is_empty() {
        return AgentStatus::Idle;
    }

    let lines: Vec<&str> = content.lines().collect();
    let recent_start = lines.len().saturating_sub(RECENT_ROWS);
    let recent = lines[recent_start..].join("\n");

    for indicator in WORKING_INDICATORS {
        if recent.contains(indicator) {
            return AgentStatus::Working;
        }
    }

    let recent_lower = recent.to_lowercase();
    for indicator in WAITING_INDICATORS {
        if recent_lower.contains(&indicator.to_lowercase()) {
            return AgentStatus::Waiting;
        }
    }

    if recent.contains(COMPLETED_INDICATOR) {
        return AgentStatus::Completed;
    }

    let last_line = lines
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .unwrap_or("");
    let last_lower = last_line.to_lowercase();
    for prompt in IDLE_PROMPT_SUFFIXES {
        if last_line.ends_with(prompt) {
            return AgentStatus::Idle;
        }
    }
    for phrase in IDLE_PHRASES {
        if last_lower.contains(phrase) {
            return AgentStatus::Idle;
        }
    }

    // Unrecognised activity reads as busy rather than stalled.
    AgentStatus::Working
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_file::write_status_file_in;

    fn detector_with(dirs: Vec<PathBuf>) -> StatusDetector {
        StatusDetector::with_dirs(dirs, CACHE_EXPIRY)
    }

    fn session() -> SessionId {
        SessionId::new("ok-12345678")
    }

    #[test]
    fn dead_pane_is_none_regardless_of_status_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_status_file_in(dir.path(), &session(), AgentStatus::Working)
            .expect("write status file");

        let detector = detector_with(vec![dir.path().to_path_buf()]);
        assert_eq!(
            detector.detect(&session(), "Thinking...", false),
            AgentStatus::None
        );
    }

    #[test]
    fn status_file_wins_over_screen_heuristics() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = session();
        fs::create_dir_all(dir.path()).expect("create status dir");
        fs::write(status_file_path(dir.path(), &session), "waiting\n")
            .expect("write status file");

        let detector = detector_with(vec![dir.path().to_path_buf()]);
        assert_eq!(
            detector.detect(&session, "Thinking very hard...", true),
            AgentStatus::Waiting
        );
    }

    #[test]
    fn first_recognised_status_file_wins() {
        let foreign = tempfile::tempdir().expect("create temp dir");
        let own = tempfile::tempdir().expect("create temp dir");
        let session = session();
        fs::write(status_file_path(foreign.path(), &session), "error\n")
            .expect("write foreign file");
        fs::write(status_file_path(own.path(), &session), "working\n").expect("write own file");

        let detector = detector_with(vec![
            foreign.path().to_path_buf(),
            own.path().to_path_buf(),
        ]);
        assert_eq!(detector.detect(&session, "", true), AgentStatus::Error);
    }

    #[test]
    fn unparseable_status_file_falls_through_to_heuristics() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = session();
        fs::write(status_file_path(dir.path(), &session), "garbled")
            .expect("write status file");

        let detector = detector_with(vec![dir.path().to_path_buf()]);
        assert_eq!(
            detector.detect(&session, "Analyzing the codebase", true),
            AgentStatus::Working
        );
    }

    #[test]
    fn token_mapping_covers_every_recognised_value() {
        assert_eq!(parse_status_token("working"), Some(AgentStatus::Working));
        assert_eq!(parse_status_token("done"), Some(AgentStatus::Idle));
        assert_eq!(parse_status_token("idle"), Some(AgentStatus::Idle));
        assert_eq!(parse_status_token("waiting"), Some(AgentStatus::Waiting));
        assert_eq!(parse_status_token("permission"), Some(AgentStatus::Waiting));
        assert_eq!(parse_status_token("error"), Some(AgentStatus::Error));
        assert_eq!(parse_status_token("completed"), Some(AgentStatus::Completed));
        assert_eq!(parse_status_token("unknown"), None);
    }

    #[test]
    fn working_indicators_classify_as_working() {
        assert_eq!(analyze_screen("⠋ compiling"), AgentStatus::Working);
        assert_eq!(analyze_screen("Thinking about it"), AgentStatus::Working);
        assert_eq!(analyze_screen("step one\nGenerating tests"), AgentStatus::Working);
        assert_eq!(analyze_screen("loading module..."), AgentStatus::Working);
    }

    #[test]
    fn waiting_indicators_classify_as_waiting() {
        assert_eq!(analyze_screen("Proceed? [Y/n]"), AgentStatus::Waiting);
        assert_eq!(analyze_screen("allow? this tool"), AgentStatus::Waiting);
        assert_eq!(
            analyze_screen("the tool needs PERMISSION to continue"),
            AgentStatus::Waiting
        );
    }

    #[test]
    fn idle_prompts_classify_as_idle() {
        assert_eq!(analyze_screen("did things\n\nclaude> "), AgentStatus::Idle);
        assert_eq!(analyze_screen("done here\n$ "), AgentStatus::Idle);
        assert_eq!(analyze_screen("❯ "), AgentStatus::Idle);
        assert_eq!(
            analyze_screen("finished\nWhat would you like to do next?"),
            AgentStatus::Idle
        );
    }

    #[test]
    fn session_ended_classifies_as_completed() {
        assert_eq!(analyze_screen("bye\nSession ended"), AgentStatus::Completed);
    }

    #[test]
    fn empty_screen_is_idle_and_unrecognised_is_working() {
        assert_eq!(analyze_screen(""), AgentStatus::Idle);
        assert_eq!(analyze_screen("   \n  "), AgentStatus::Idle);
        assert_eq!(analyze_screen("some inscrutable output"), AgentStatus::Working);
    }

    #[test]
    fn only_recent_rows_are_scanned() {
        // A waiting indicator that scrolled out of the last ten rows loses
        // to the idle prompt on the final line.
        let mut lines: Vec<String> = vec!["Proceed? [Y/n]".to_owned()];
        lines.extend((0..11).map(|i| format!("quiet line {i}")));
        lines.push("claude>".to_owned());
        assert_eq!(analyze_screen(&lines.join("\n")), AgentStatus::Idle);

        // Inside the window it still wins.
        let recent = "Proceed? [Y/n]\nclaude>";
        assert_eq!(analyze_screen(recent), AgentStatus::Waiting);
    }

    #[test]
    fn second_call_within_expiry_is_served_from_cache() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = session();
        let detector = detector_with(vec![dir.path().to_path_buf()]);

        assert_eq!(
            detector.detect(&session, "Thinking", true),
            AgentStatus::Working
        );
        // The screen changed, but the cached decision is still fresh.
        assert_eq!(
            detector.detect(&session, "claude> ", true),
            AgentStatus::Working
        );
    }

    #[test]
    fn zero_expiry_treats_every_entry_as_expired() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = session();
        let detector = StatusDetector::with_dirs(vec![dir.path().to_path_buf()], Duration::ZERO);

        assert_eq!(
            detector.detect(&session, "Thinking", true),
            AgentStatus::Working
        );
        // age >= expiry counts as expired, so the new screen is rescanned.
        assert_eq!(
            detector.detect(&session, "claude> ", true),
            AgentStatus::Idle
        );
    }

    #[test]
    fn invalidation_forces_a_fresh_decision() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let session = session();
        let detector = detector_with(vec![dir.path().to_path_buf()]);

        detector.detect(&session, "Thinking", true);
        let invalidated_at = Instant::now();
        detector.invalidate(Some(&session));
        assert_eq!(detector.captured_at(&session), None);

        assert_eq!(
            detector.detect(&session, "claude> ", true),
            AgentStatus::Idle
        );
        let captured = detector
            .captured_at(&session)
            .expect("fresh decision is cached");
        assert!(captured >= invalidated_at);
    }

    #[test]
    fn invalidate_all_clears_every_session() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let detector = detector_with(vec![dir.path().to_path_buf()]);
        let first = SessionId::new("ok-first");
        let second = SessionId::new("ok-second");

        detector.detect(&first, "Thinking", true);
        detector.detect(&second, "Thinking", true);
        detector.invalidate(None);

        assert_eq!(detector.captured_at(&first), None);
        assert_eq!(detector.captured_at(&second), None);
    }
}
