use std::fmt::Write as _;

use crate::{Config, ConfigError, KNOWN_THEMES, MIN_POLL_INTERVAL_SECS, PROMPT_PLACEHOLDERS};

/// A single validation issue, attributed to a config section and field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEntry {
    pub section: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationEntry>,
    pub warnings: Vec<ValidationEntry>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn add_error(&mut self, section: &str, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationEntry {
            section: section.to_owned(),
            field: field.to_owned(),
            message: message.into(),
        });
    }

    fn add_warning(&mut self, section: &str, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationEntry {
            section: section.to_owned(),
            field: field.to_owned(),
            message: message.into(),
        });
    }

    pub fn format_errors(&self) -> String {
        format_entries(&self.errors)
    }

    pub fn format_warnings(&self) -> String {
        format_entries(&self.warnings)
    }

    /// Errors rendered as a `ConfigError` so the binary can refuse to start.
    pub fn into_startup_error(self) -> Option<ConfigError> {
        if self.has_errors() {
            Some(ConfigError::Invalid(self.format_errors()))
        } else {
            None
        }
    }
}

fn format_entries(entries: &[ValidationEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        if entry.field.is_empty() {
            let _ = writeln!(out, "  [{}]", entry.section);
        } else {
            let _ = writeln!(out, "  [{}] {}", entry.section, entry.field);
        }
        let _ = writeln!(out, "    {}", entry.message);
    }
    out
}

impl Config {
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        self.validate_defaults(&mut result);
        self.validate_agents(&mut result);
        result
    }

    fn validate_defaults(&self, result: &mut ValidationResult) {
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            result.add_error(
                "defaults",
                "poll_interval_secs",
                format!(
                    "must be at least {MIN_POLL_INTERVAL_SECS} (got {})",
                    self.poll_interval_secs
                ),
            );
        }

        if self.default_agent.is_empty() {
            result.add_error("defaults", "default_agent", "is required but missing");
        } else if !self.agents.contains_key(&self.default_agent) {
            result.add_error(
                "defaults",
                "default_agent",
                format!("references undefined agent \"{}\"", self.default_agent),
            );
        }

        if !self.theme.is_empty() && !KNOWN_THEMES.contains(&self.theme.as_str()) {
            result.add_warning(
                "ui",
                "theme",
                format!(
                    "unknown theme \"{}\", falling back to catppuccin-mocha. Available: {}",
                    self.theme,
                    KNOWN_THEMES.join(", ")
                ),
            );
        }
    }

    fn validate_agents(&self, result: &mut ValidationResult) {
        if self.agents.is_empty() {
            result.add_error("agents", "", "at least one agent must be configured");
        }

        for (name, agent) in &self.agents {
            let section = format!("agents.{name}");

            if agent.command.is_empty() {
                result.add_error(&section, "command", "is required but missing");
            } else if name == &self.default_agent && !command_in_path(&agent.command) {
                result.add_warning(
                    &section,
                    "command",
                    format!("executable \"{}\" not found in PATH", agent.command),
                );
            }

            if !agent.init_prompt.is_empty() {
                for placeholder in unknown_placeholders(&agent.init_prompt) {
                    result.add_error(
                        &section,
                        "init_prompt",
                        format!(
                            "unknown placeholder {placeholder}; valid placeholders: {}",
                            PROMPT_PLACEHOLDERS.join(", ")
                        ),
                    );
                }
            }
        }
    }
}

/// Placeholders in `template` that are not in the supported set.
fn unknown_placeholders(template: &str) -> Vec<String> {
    let mut unknown = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let tail = &rest[start..];
        let Some(end) = tail.find("}}") else {
            unknown.push(tail.to_owned());
            break;
        };
        let placeholder = &tail[..end + 2];
        if !PROMPT_PLACEHOLDERS.contains(&placeholder) {
            unknown.push(placeholder.to_owned());
        }
        rest = &tail[end + 2..];
    }
    unknown
}

fn command_in_path(command: &str) -> bool {
    if command.contains(std::path::MAIN_SEPARATOR) {
        return std::path::Path::new(command).exists();
    }
    let Ok(path) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(command).exists())
}
