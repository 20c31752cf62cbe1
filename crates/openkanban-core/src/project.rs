use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::write_atomically;
use crate::{CoreError, CoreResult, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub repo_path: PathBuf,
}

/// The project registry: `(id, name, repo_path)` entries persisted as
/// `projects.json` in the data directory.
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|error| {
            CoreError::Persistence(format!(
                "failed to read project registry '{}': {error}",
                path.display()
            ))
        })?;
        let projects: Vec<Project> = serde_json::from_str(&raw).map_err(|error| {
            CoreError::Persistence(format!(
                "failed to parse project registry '{}': {error}",
                path.display()
            ))
        })?;
        Ok(Self { projects })
    }

    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let rendered = serde_json::to_string_pretty(&self.projects).map_err(|error| {
            CoreError::Persistence(format!("failed to encode project registry: {error}"))
        })?;
        write_atomically(path, rendered.as_bytes())
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|project| &project.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|project| project.name.eq_ignore_ascii_case(name))
    }

    pub fn add(&mut self, project: Project) {
        self.projects.push(project);
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
