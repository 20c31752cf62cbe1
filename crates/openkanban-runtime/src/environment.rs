/// Environment variable prefixes that betray a hosting agent session. A
/// spawned agent that sees its own vendor variables assumes it is nested
/// and refuses to start interactively.
pub const VENDOR_PREFIXES: &[&str] = &["OPENCODE", "CLAUDE", "GEMINI", "CODEX"];

const TERM_VALUE: &str = "xterm-256color";

/// A filtered copy of the calling process environment for child agents:
/// vendor-prefixed variables are dropped and `TERM` is pinned.
pub fn sanitized_environment() -> Vec<(String, String)> {
    sanitize_environment(std::env::vars().collect())
}

pub fn sanitize_environment(vars: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut sanitized: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| name != "TERM" && !has_vendor_prefix(name))
        .collect();
    sanitized.push(("TERM".to_owned(), TERM_VALUE.to_owned()));
    sanitized
}

fn has_vendor_prefix(name: &str) -> bool {
    VENDOR_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}
