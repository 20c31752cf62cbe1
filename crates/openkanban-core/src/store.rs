use std::fs;
use std::path::{Path, PathBuf};

use crate::{CoreError, CoreResult, ProjectId, Ticket};

/// JSON ticket store. One file per project under the data directory; every
/// save goes through a temp file and an atomic rename.
#[derive(Debug, Clone)]
pub struct TicketStore {
    data_dir: PathBuf,
}

impl TicketStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn tickets_path(&self, project: &ProjectId) -> PathBuf {
        self.data_dir
            .join(format!("tickets-{}.json", project.as_str()))
    }

    pub fn load(&self, project: &ProjectId) -> CoreResult<Vec<Ticket>> {
        let path = self.tickets_path(project);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path).map_err(|error| {
            CoreError::Persistence(format!(
                "failed to read ticket store '{}': {error}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            CoreError::Persistence(format!(
                "failed to parse ticket store '{}': {error}",
                path.display()
            ))
        })
    }

    pub fn save(&self, project: &ProjectId, tickets: &[Ticket]) -> CoreResult<()> {
        let mut ordered: Vec<&Ticket> = tickets.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let rendered = serde_json::to_string_pretty(&ordered).map_err(|error| {
            CoreError::Persistence(format!("failed to encode ticket store: {error}"))
        })?;
        write_atomically(&self.tickets_path(project), rendered.as_bytes())
    }
}

pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> CoreResult<()> {
    let parent = path.parent().ok_or_else(|| {
        CoreError::Persistence(format!("store path '{}' has no parent", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(|error| {
        CoreError::Persistence(format!(
            "failed to create store directory '{}': {error}",
            parent.display()
        ))
    })?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, contents).map_err(|error| {
        CoreError::Persistence(format!(
            "failed to write '{}': {error}",
            temp_path.display()
        ))
    })?;
    fs::rename(&temp_path, path).map_err(|error| {
        CoreError::Persistence(format!(
            "failed to replace '{}': {error}",
            path.display()
        ))
    })
}
