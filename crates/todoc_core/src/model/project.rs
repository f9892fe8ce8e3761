//! Project record and keyed lookup.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-assigned project identifier.
pub type ProjectId = i64;

/// Named, colored grouping that tasks belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// ARGB color, stored opaquely.
    pub color: u32,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>, color: u32) -> Self {
        Self {
            id,
            name: name.into(),
            color,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::EmptyProjectName);
        }
        Ok(())
    }
}

/// Id-keyed view over a project snapshot.
///
/// Built from the latest `get_all_projects` emission so task rows can resolve
/// their project without scanning a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectIndex {
    by_id: HashMap<ProjectId, Project>,
}

impl ProjectIndex {
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        Self {
            by_id: projects
                .into_iter()
                .map(|project| (project.id, project.clone()))
                .collect(),
        }
    }

    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
